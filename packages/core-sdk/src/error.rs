use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ProviderKind;

/**
 * \brief SDK 统一错误类型。除 UnknownProvider 外均视为一次交互失败，直接展示给用户。
 */
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key for {0} is missing. Please check your .env file.")]
    MissingCredential(ProviderKind),

    #[error("{provider} request failed: {status} -> {body}")]
    Status {
        provider: ProviderKind,
        status: StatusCode,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("unexpected {provider} payload: {detail}")]
    MalformedResponse {
        provider: ProviderKind,
        detail: String,
    },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ChatError {
    /** \brief 面向用户的错误文本。 */
    pub fn user_message(&self) -> String {
        format!("Error: {}", self)
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
