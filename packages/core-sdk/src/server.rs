use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, get_service, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::{
    controller::{ChatController, SendOutcome},
    models::{ProviderKind, Role},
    session::{Session, SessionStore, SharedSession},
};

type ApiError = (StatusCode, String);

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/**
 * \brief 路由共享状态：控制器与会话表。
 */
#[derive(Clone)]
pub struct AppState {
    controller: Arc<ChatController>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(controller: Arc<ChatController>) -> Self {
        Self {
            controller,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

/**
 * \brief 启动本地 HTTP 服务，提供静态前端与 API。
 * \param addr 监听地址，如 "127.0.0.1:5173"
 */
pub async fn run(addr: &str, controller: Arc<ChatController>) -> Result<()> {
    let ui_root = controller.settings().ui_dir.clone();
    let idle_ttl = controller.settings().session_idle_ttl;
    let static_handler = ServeDir::new(ui_root).append_index_html_on_directories(true);
    let static_service = get_service(static_handler);

    let state = AppState::new(controller);
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sessions.sweep_idle(idle_ttl);
        }
    });

    let app = router(state).fallback_service(static_service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 仅包含 API 的路由表。
 */
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(get_config))
        .route("/api/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(end_session))
        .route("/api/sessions/{id}/provider", put(select_provider))
        .route(
            "/api/sessions/{id}/messages",
            post(send_message).delete(clear_messages),
        )
        .with_state(state)
}

#[derive(Serialize, Debug)]
struct ProviderItem {
    provider: ProviderKind,
    name: &'static str,
    model: String,
    has_credential: bool,
}

#[derive(Serialize, Debug)]
struct ConfigResponse {
    providers: Vec<ProviderItem>,
    default_provider: ProviderKind,
    /** \brief 启动时的凭据警告 */
    warning: Option<&'static str>,
}

#[derive(Serialize, Debug)]
struct MessageDto {
    role: Role,
    label: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct SessionView {
    session_id: Uuid,
    provider: ProviderKind,
    provider_name: &'static str,
    created_at: String,
    messages: Vec<MessageDto>,
}

#[derive(Deserialize, Debug)]
struct SelectProviderRequest {
    /** \brief Provider 标识，如 "openai" */
    provider: String,
}

#[derive(Deserialize, Debug)]
struct SendRequest {
    /** \brief 用户输入 */
    text: String,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ExchangeStatus {
    Ignored,
    Answered,
    Failed,
}

#[derive(Serialize, Debug)]
struct ExchangeResponse {
    status: ExchangeStatus,
    /** \brief 失败时展示给用户的错误文本 */
    error: Option<String>,
    session: SessionView,
}

#[derive(Serialize, Debug)]
struct ClearResponse {
    notice: &'static str,
    session: SessionView,
}

fn session_view(session: &Session) -> Result<SessionView, ApiError> {
    let created_at = session.created_at().format(&Rfc3339).map_err(internal_err)?;
    Ok(SessionView {
        session_id: session.id(),
        provider: session.provider(),
        provider_name: session.provider().display_name(),
        created_at,
        messages: session
            .transcript()
            .map(|entry| MessageDto {
                role: entry.role,
                label: entry.label,
                content: entry.text.to_string(),
            })
            .collect(),
    })
}

fn lookup(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(&id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("session {} not found", id)))
}

fn internal_err<E: std::fmt::Display>(e: E) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/**
 * \brief 获取 Provider 列表与凭据状态。
 */
async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let settings = state.controller.settings();
    let providers = settings
        .providers()
        .map(|p| ProviderItem {
            provider: p.kind,
            name: p.kind.display_name(),
            model: p.model.clone(),
            has_credential: p.has_credential(),
        })
        .collect();
    Json(ConfigResponse {
        providers,
        default_provider: ProviderKind::default(),
        warning: state.controller.startup_warning(),
    })
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

/**
 * \brief 新建会话。
 */
async fn create_session(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let session = state.controller.open_session();
    let view = session_view(&session)?;
    state.sessions.insert(session);
    Ok(Json(view))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = lookup(&state, id)?;
    let session = shared.lock().await;
    Ok(Json(session_view(&session)?))
}

/**
 * \brief 结束会话，日志随之销毁。
 */
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id) {
        tracing::debug!(session = %id, "session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("session {} not found", id)))
    }
}

/**
 * \brief 切换当前会话的 Provider。
 */
async fn select_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectProviderRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let kind: ProviderKind = payload
        .provider
        .parse()
        .map_err(|e: crate::error::ChatError| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    session.select_provider(kind);
    Ok(Json(session_view(&session)?))
}

/**
 * \brief 发送一条消息。远端失败不算 HTTP 错误，通过 error 字段返回。
 */
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendRequest>,
) -> Result<Json<ExchangeResponse>, ApiError> {
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    let (status, error) = match state.controller.send(&mut session, &payload.text).await {
        Ok(SendOutcome::Ignored) => (ExchangeStatus::Ignored, None),
        Ok(SendOutcome::Answered) => (ExchangeStatus::Answered, None),
        Err(e) => (ExchangeStatus::Failed, Some(e.user_message())),
    };
    Ok(Json(ExchangeResponse {
        status,
        error,
        session: session_view(&session)?,
    }))
}

/**
 * \brief 清空当前会话历史。
 */
async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClearResponse>, ApiError> {
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    let notice = session.clear();
    Ok(Json(ClearResponse {
        notice,
        session: session_view(&session)?,
    }))
}
