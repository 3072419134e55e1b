pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用类型。
 */
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::controller::{ChatController, SendOutcome};
    pub use crate::error::ChatError;
    pub use crate::llm::{CompletionBackend, HttpBackend};
    pub use crate::models::{Message, ProviderKind, Role};
    pub use crate::session::{ConversationLog, Session, SessionStore};
    pub use crate::{server, telemetry};
}
