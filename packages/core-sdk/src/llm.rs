use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::error::{ChatError, Result};
use crate::models::{Credential, Message, ProviderConfig, ProviderKind, Role, WireMessage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/**
 * \brief 远端补全调用的抽象：给定完整有序的会话，返回一段回复文本或错误。
 */
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, provider: &ProviderConfig, messages: &[Message]) -> Result<String>;
}

/**
 * \brief 基于 reqwest 的真实后端，非流式，一次请求一次回复。
 */
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /** \brief 复用调用方构造的 client（代理、超时等由调用方决定）。 */
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, provider: &ProviderConfig, messages: &[Message]) -> Result<String> {
        let credential = provider
            .credential
            .as_ref()
            .ok_or(ChatError::MissingCredential(provider.kind))?;
        match provider.kind {
            ProviderKind::OpenAI => {
                chat_once_openai(&self.client, provider, credential, messages).await
            }
            ProviderKind::Anthropic => {
                chat_once_claude(&self.client, provider, credential, messages).await
            }
        }
    }
}

async fn chat_once_openai(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    credential: &Credential,
    messages: &[Message],
) -> Result<String> {
    let url = format!(
        "{}/v1/chat/completions",
        provider.api_base.trim_end_matches('/')
    );
    let body = openai_payload(&provider.model, messages);

    let resp = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(ChatError::Status {
            provider: provider.kind,
            status,
            body: text,
        });
    }
    let v: Value = resp.json().await?;
    extract_openai_content(&v).ok_or_else(|| ChatError::MalformedResponse {
        provider: provider.kind,
        detail: v.to_string(),
    })
}

async fn chat_once_claude(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    credential: &Credential,
    messages: &[Message],
) -> Result<String> {
    let url = format!("{}/v1/messages", provider.api_base.trim_end_matches('/'));
    let body = json!({
        "model": provider.model,
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "messages": anthropic_payload(messages),
    });

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("x-api-key", HeaderValue::from_str(credential.expose())?);
    headers.insert(
        "anthropic-version",
        HeaderValue::from_static(ANTHROPIC_VERSION),
    );

    let resp = client.post(url).headers(headers).json(&body).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(ChatError::Status {
            provider: provider.kind,
            status,
            body: text,
        });
    }
    let v: Value = resp.json().await?;
    extract_anthropic_content(&v).ok_or_else(|| ChatError::MalformedResponse {
        provider: provider.kind,
        detail: v.to_string(),
    })
}

fn openai_payload(model: &str, messages: &[Message]) -> Value {
    let wire: Vec<WireMessage<'_>> = messages.iter().map(WireMessage::from).collect();
    json!({
        "model": model,
        "messages": wire,
        "stream": false
    })
}

fn anthropic_payload(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role() {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({
                "role": role,
                "content": [{"type": "text", "text": msg.text()}]
            })
        })
        .collect()
}

fn extract_openai_content(v: &Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extract_anthropic_content(v: &Value) -> Option<String> {
    let parts: Vec<&str> = v
        .get("content")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
        .collect();
    let joined = parts.join("");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<Message> {
        vec![
            Message::user("Hello"),
            Message::assistant(ProviderKind::OpenAI, "Hi there"),
            Message::user("How are you?"),
        ]
    }

    #[test]
    fn openai_payload_keeps_order_and_roles() {
        let body = openai_payload("gpt-3.5-turbo", &history());
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["stream"], false);
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "Hello"},
                {"role": "assistant", "content": "Hi there"},
                {"role": "user", "content": "How are you?"}
            ])
        );
    }

    #[test]
    fn anthropic_payload_wraps_text_blocks() {
        let items = anthropic_payload(&history());
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["role"], "assistant");
        assert_eq!(items[1]["content"][0]["type"], "text");
        assert_eq!(items[2]["content"][0]["text"], "How are you?");
    }

    #[test]
    fn extracts_openai_reply() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "Hi there"}}]});
        assert_eq!(extract_openai_content(&v).as_deref(), Some("Hi there"));
        assert_eq!(extract_openai_content(&json!({"error": "nope"})), None);
        let blank = json!({"choices": [{"message": {"content": ""}}]});
        assert_eq!(extract_openai_content(&blank), None);
    }

    #[test]
    fn extracts_anthropic_reply() {
        let v = json!({"content": [{"type": "text", "text": "Hi"}, {"type": "text", "text": " there"}]});
        assert_eq!(extract_anthropic_content(&v).as_deref(), Some("Hi there"));
        assert_eq!(extract_anthropic_content(&json!({"content": []})), None);
        let blank = json!({"content": [{"type": "text", "text": ""}]});
        assert_eq!(extract_anthropic_content(&blank), None);
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        let backend = HttpBackend::new().unwrap();
        let mut provider = ProviderConfig::from_defaults(ProviderKind::Anthropic);
        provider.api_base = "http://127.0.0.1:9".to_string();
        let err = backend
            .complete(&provider, &[Message::user("Hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MissingCredential(ProviderKind::Anthropic)));
    }

    // ====================================================================
    // Stub upstream
    // ====================================================================

    use axum::{http::HeaderMap as StubHeaders, http::StatusCode, routing::post, Json, Router};

    const GOOD_KEY: &str = "sk-good";

    fn header<'h>(headers: &'h StubHeaders, name: &str) -> &'h str {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Model "empty" answers 200 with `{}`; a wrong key answers 401.
    async fn stub_openai(headers: StubHeaders, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if header(&headers, "authorization") != format!("Bearer {}", GOOD_KEY) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"})));
        }
        if body["model"] == "empty" {
            return (StatusCode::OK, Json(json!({})));
        }
        let last = body["messages"][0]["content"].as_str().unwrap_or_default();
        let reply = json!({"choices": [{"message": {"role": "assistant", "content": format!("gpt heard {}", last)}}]});
        (StatusCode::OK, Json(reply))
    }

    async fn stub_anthropic(headers: StubHeaders, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if header(&headers, "x-api-key") != GOOD_KEY
            || header(&headers, "anthropic-version") != ANTHROPIC_VERSION
        {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"})));
        }
        if body["model"] == "empty" {
            return (StatusCode::OK, Json(json!({})));
        }
        let last = body["messages"][0]["content"][0]["text"]
            .as_str()
            .unwrap_or_default();
        let reply = json!({"content": [{"type": "text", "text": format!("claude heard {}", last)}]});
        (StatusCode::OK, Json(reply))
    }

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(stub_openai))
            .route("/v1/messages", post(stub_anthropic));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn stub_backend() -> HttpBackend {
        HttpBackend::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    fn stub_provider(kind: ProviderKind, base: &str, key: &str, model: &str) -> ProviderConfig {
        ProviderConfig {
            kind,
            api_base: base.to_string(),
            model: model.to_string(),
            credential: Credential::new(key),
        }
    }

    #[tokio::test]
    async fn http_backend_returns_reply_with_correct_headers() {
        let base = spawn_stub().await;
        let backend = stub_backend();
        let hello = [Message::user("Hello")];

        let openai = stub_provider(ProviderKind::OpenAI, &base, GOOD_KEY, "gpt-3.5-turbo");
        assert_eq!(backend.complete(&openai, &hello).await.unwrap(), "gpt heard Hello");

        let claude = stub_provider(ProviderKind::Anthropic, &base, GOOD_KEY, "claude-2.1");
        assert_eq!(backend.complete(&claude, &hello).await.unwrap(), "claude heard Hello");
    }

    #[tokio::test]
    async fn http_backend_maps_rejection_to_status_error() {
        let base = spawn_stub().await;
        let backend = stub_backend();

        for kind in ProviderKind::ALL {
            let provider = stub_provider(kind, &base, "sk-wrong", "any");
            let err = backend
                .complete(&provider, &[Message::user("Hello")])
                .await
                .unwrap_err();
            match err {
                ChatError::Status {
                    provider,
                    status,
                    body,
                } => {
                    assert_eq!(provider, kind);
                    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                    assert!(body.contains("invalid api key"), "{body}");
                }
                other => panic!("expected status error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn http_backend_rejects_reply_without_text() {
        let base = spawn_stub().await;
        let backend = stub_backend();

        for kind in ProviderKind::ALL {
            let provider = stub_provider(kind, &base, GOOD_KEY, "empty");
            let err = backend
                .complete(&provider, &[Message::user("Hello")])
                .await
                .unwrap_err();
            assert!(
                matches!(err, ChatError::MalformedResponse { provider, .. } if provider == kind),
                "{err:?}"
            );
        }
    }
}
