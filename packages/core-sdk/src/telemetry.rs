use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "chatstarter.log";

/**
 * \brief 初始化全局日志：stderr 始终输出，受 RUST_LOG 控制（默认 info）。
 * \param file_enabled 遥测开关，开启时额外追加写入 logs/chatstarter.log
 * \return 文件写入线程的守卫，需在进程退出前一直持有
 */
pub fn init(file_enabled: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let (file_layer, guard) = if file_enabled {
        let log_dir = PathBuf::from(LOG_DIR);
        if !log_dir.exists() {
            std::fs::create_dir_all(&log_dir)?;
        }
        let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}
