use std::time::Duration;

use crate::models::{Credential, ProviderConfig, ProviderKind};

/** \brief 启动时凭据缺失的提示。 */
pub const MISSING_KEYS_WARNING: &str = "API keys are missing. Please check your .env file.";

const UI_DIR_ENV: &str = "CHATSTARTER_UI_DIR";
const TELEMETRY_ENV: &str = "CHATSTARTER_TELEMETRY";
const SESSION_TTL_ENV: &str = "CHATSTARTER_SESSION_TTL_SECS";
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/**
 * \brief 进程级配置，全部来自环境变量；.env 文件由外部加载。
 */
#[derive(Debug, Clone)]
pub struct Settings {
    providers: [ProviderConfig; 2],
    /** \brief 静态页面目录 */
    pub ui_dir: String,
    /** \brief 是否额外写入 logs/ 日志文件 */
    pub telemetry_enabled: bool,
    /** \brief 服务端会话空闲多久后回收 */
    pub session_idle_ttl: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * \brief 通过任意键值查找函数构造，便于测试注入。
     */
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let providers = ProviderKind::ALL.map(|kind| {
            let row = kind.defaults();
            let mut config = ProviderConfig::from_defaults(kind);
            if let Some(base) = non_blank(row.base_env) {
                config.api_base = base.trim().to_string();
            }
            if let Some(model) = non_blank(row.model_env) {
                config.model = model.trim().to_string();
            }
            config.credential = lookup(row.key_env)
                .and_then(|raw| Credential::new(raw.trim()));
            config
        });

        Self {
            providers,
            ui_dir: non_blank(UI_DIR_ENV).unwrap_or_else(|| "web".to_string()),
            telemetry_enabled: non_blank(TELEMETRY_ENV)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            session_idle_ttl: non_blank(SESSION_TTL_ENV)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SESSION_TTL),
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderConfig {
        &self.providers[kind as usize]
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    pub fn missing_credentials(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|p| !p.has_credential())
            .map(|p| p.kind)
            .collect()
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
