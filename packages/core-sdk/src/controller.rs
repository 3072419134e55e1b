use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Settings, MISSING_KEYS_WARNING};
use crate::error::Result;
use crate::llm::CompletionBackend;
use crate::models::{Message, ProviderKind};
use crate::session::Session;

/**
 * \brief 一次发送的结果。失败通过 Err 返回，此时用户消息已经留在日志里。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /** \brief 空输入，什么也没做 */
    Ignored,
    /** \brief 已追加用户消息与助手回复 */
    Answered,
}

/**
 * \brief 会话控制器：持有配置与远端后端，会话对象由调用方持有并传入。
 */
pub struct ChatController {
    settings: Settings,
    backend: Arc<dyn CompletionBackend>,
    startup_warning: Option<&'static str>,
}

impl ChatController {
    /**
     * \brief 构造时检查两个凭据；缺失只记录警告，不阻止启动。
     */
    pub fn new(settings: Settings, backend: Arc<dyn CompletionBackend>) -> Self {
        let missing = settings.missing_credentials();
        let startup_warning = if missing.is_empty() {
            None
        } else {
            let slugs: Vec<&str> = missing.iter().map(|k| k.slug()).collect();
            warn!(missing = ?slugs, "{}", MISSING_KEYS_WARNING);
            Some(MISSING_KEYS_WARNING)
        };
        Self {
            settings,
            backend,
            startup_warning,
        }
    }

    pub fn startup_warning(&self) -> Option<&'static str> {
        self.startup_warning
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /** \brief 新会话：空日志，默认 Provider。 */
    pub fn open_session(&self) -> Session {
        let session = Session::new(ProviderKind::default());
        debug!(session = %session.id(), "session opened");
        session
    }

    /**
     * \brief 一次交互：追加用户消息，带完整历史调用当前 Provider，成功则追加回复。
     *
     * 空输入直接返回 Ignored。远端失败时不回滚用户消息，也不重试。
     */
    pub async fn send(&self, session: &mut Session, text: &str) -> Result<SendOutcome> {
        if text.is_empty() {
            debug!(session = %session.id(), "empty input ignored");
            return Ok(SendOutcome::Ignored);
        }

        let kind = session.provider();
        session.log_mut().push(Message::user(text));
        let provider = self.settings.provider(kind);
        info!(
            session = %session.id(),
            provider = kind.slug(),
            model = %provider.model,
            history = session.log().len(),
            prompt_len = text.len(),
            "exchange started"
        );

        let result = self.backend.complete(provider, session.log().messages()).await;
        match result {
            Ok(reply) => {
                info!(session = %session.id(), reply_len = reply.len(), "exchange answered");
                session.log_mut().push(Message::assistant(kind, reply));
                Ok(SendOutcome::Answered)
            }
            Err(err) => {
                warn!(session = %session.id(), provider = kind.slug(), error = %err, "exchange failed");
                Err(err)
            }
        }
    }
}
