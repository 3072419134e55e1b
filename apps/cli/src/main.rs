mod repl;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use chatstarter_core_sdk::prelude::*;
use repl::ReplCommand;

/**
 * \brief CLI 程序入口：浏览器页面服务或终端对话。
 */
#[derive(Parser, Debug)]
#[command(name = "chatstarter", version, about = "Chat with OpenAI or Anthropic models")]
struct Cli {
    /** \brief 额外把日志写入 logs/chatstarter.log */
    #[arg(
        long,
        global = true,
        env = "CHATSTARTER_TELEMETRY",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    enable_telemetry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动本地 HTTP 服务并提供前端页面。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:5173")]
        addr: String,
    },

    /**
     * \brief 在终端中进行多轮对话。
     */
    Chat {
        /** \brief 初始 Provider：openai 或 anthropic */
        #[arg(long)]
        provider: Option<String>,
    },

    /**
     * \brief 列出 Provider 及凭据状态。
     */
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_env();
    let _log_guard = telemetry::init(settings.telemetry_enabled || cli.enable_telemetry)
        .context("init logging failed")?;

    let backend = Arc::new(HttpBackend::new().context("build http client failed")?);
    let controller = Arc::new(ChatController::new(settings, backend));

    match cli.command {
        Commands::Serve { addr } => {
            server::run(&addr, controller).await?;
        }
        Commands::Chat { provider } => {
            let initial = provider
                .as_deref()
                .map(str::parse::<ProviderKind>)
                .transpose()
                .context("invalid --provider")?;
            run_chat(&controller, initial).await?;
        }
        Commands::Providers => {
            for p in controller.settings().providers() {
                println!(
                    "{:<10} {:<18} {:<16} {} (key: {})",
                    p.kind.slug(),
                    p.kind.display_name(),
                    p.model,
                    p.api_base,
                    if p.has_credential() { "set" } else { "missing" }
                );
            }
        }
    }

    Ok(())
}

async fn run_chat(controller: &ChatController, initial: Option<ProviderKind>) -> Result<()> {
    if let Some(warning) = controller.startup_warning() {
        eprintln!("{}", warning);
    }

    let mut session = controller.open_session();
    if let Some(kind) = initial {
        session.select_provider(kind);
    }
    tracing::debug!(session = %session.id(), provider = session.provider().slug(), "repl started");
    println!("Chatting with {} ({})", session.provider(), repl::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await.context("read stdin failed")? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", repl::HELP),
            ReplCommand::Clear => println!("{}", session.clear()),
            ReplCommand::History => print_transcript(&session),
            ReplCommand::Provider(None) => {
                for kind in ProviderKind::ALL {
                    let marker = if kind == session.provider() { "*" } else { " " };
                    println!("{} {:<10} {}", marker, kind.slug(), kind.display_name());
                }
            }
            ReplCommand::Provider(Some(name)) => match name.parse::<ProviderKind>() {
                Ok(kind) => {
                    session.select_provider(kind);
                    println!("Now chatting with {}", kind);
                }
                Err(e) => {
                    tracing::warn!(session = %session.id(), error = %e, "provider not switched");
                    eprintln!("{}", e);
                }
            },
            ReplCommand::Send(text) => {
                let outcome = controller.send(&mut session, text).await;
                match outcome {
                    Ok(SendOutcome::Ignored) => {}
                    Ok(SendOutcome::Answered) => {
                        if let Some(reply) = session.log().last() {
                            println!("{}: {}", reply.label(), reply.text());
                        }
                    }
                    Err(e) => eprintln!("{}", e.user_message()),
                }
            }
        }
    }

    tracing::debug!(session = %session.id(), messages = session.log().len(), "repl finished");
    Ok(())
}

fn print_transcript(session: &Session) {
    println!("Chat History");
    for entry in session.transcript() {
        println!("{}: {}", entry.label, entry.text);
    }
}
