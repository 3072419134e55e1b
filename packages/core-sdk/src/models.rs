use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ChatError;

/**
 * \brief 可选模型服务的封闭枚举，新增服务需同时在 PROVIDER_TABLE 中补一行。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI = 0,
    Anthropic = 1,
}

impl ProviderKind {
    /** \brief 所有服务，顺序即界面下拉框顺序。 */
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAI, ProviderKind::Anthropic];

    /** \brief 对应的静态配置行。 */
    pub fn defaults(self) -> &'static ProviderDefaults {
        &PROVIDER_TABLE[self as usize]
    }

    pub fn slug(self) -> &'static str {
        self.defaults().slug
    }

    pub fn display_name(self) -> &'static str {
        self.defaults().display_name
    }
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::ALL[0]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| {
                kind.slug().eq_ignore_ascii_case(wanted) || kind.display_name() == wanted
            })
            .ok_or_else(|| ChatError::UnknownProvider(wanted.to_string()))
    }
}

/**
 * \brief Provider 静态配置行：端点、模型与环境变量名。
 */
#[derive(Debug)]
pub struct ProviderDefaults {
    pub kind: ProviderKind,
    pub slug: &'static str,
    pub display_name: &'static str,
    pub api_base: &'static str,
    pub model: &'static str,
    /** \brief 凭据所在环境变量 */
    pub key_env: &'static str,
    pub base_env: &'static str,
    pub model_env: &'static str,
}

/** \brief 行序必须与 ProviderKind 的判别值一致。 */
pub static PROVIDER_TABLE: [ProviderDefaults; 2] = [
    ProviderDefaults {
        kind: ProviderKind::OpenAI,
        slug: "openai",
        display_name: "OpenAI GPT-3.5",
        api_base: "https://api.openai.com",
        model: "gpt-3.5-turbo",
        key_env: "OPENAI_API_KEY",
        base_env: "OPENAI_API_BASE",
        model_env: "OPENAI_MODEL",
    },
    ProviderDefaults {
        kind: ProviderKind::Anthropic,
        slug: "anthropic",
        display_name: "Anthropic Claude",
        api_base: "https://api.anthropic.com",
        model: "claude-2.1",
        key_env: "ANTHROPIC_API_KEY",
        base_env: "ANTHROPIC_API_BASE",
        model_env: "ANTHROPIC_MODEL",
    },
];

/**
 * \brief API 凭据。只能通过 new 构造，保证非空；Debug 输出不含明文。
 */
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /** \brief 空串或纯空白视为缺失。 */
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/**
 * \brief 运行期 Provider 配置：静态行 + 环境覆盖后的端点、模型和凭据。
 */
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /** \brief API 基地址 */
    pub api_base: String,
    /** \brief 模型名 */
    pub model: String,
    pub credential: Option<Credential>,
}

impl ProviderConfig {
    pub fn from_defaults(kind: ProviderKind) -> Self {
        let row = kind.defaults();
        Self {
            kind,
            api_base: row.api_base.to_string(),
            model: row.model.to_string(),
            credential: None,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

/**
 * \brief 消息角色，序列化后与 OpenAI Chat 格式对齐。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/**
 * \brief 会话消息。追加后不可修改，助手消息记录产生它的 Provider。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    User(String),
    Assistant { provider: ProviderKind, text: String },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User(text.into())
    }

    pub fn assistant(provider: ProviderKind, text: impl Into<String>) -> Self {
        Message::Assistant {
            provider,
            text: text.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::User(_) => Role::User,
            Message::Assistant { .. } => Role::Assistant,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Message::User(text) => text,
            Message::Assistant { text, .. } => text,
        }
    }

    /** \brief 展示标签：用户为 "You"，助手为生成该回复的 Provider 名称。 */
    pub fn label(&self) -> &'static str {
        match self {
            Message::User(_) => "You",
            Message::Assistant { provider, .. } => provider.display_name(),
        }
    }
}

/**
 * \brief 发往远端的最简消息结构 {role, content}。
 */
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role(),
            content: msg.text(),
        }
    }
}
