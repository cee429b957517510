//! HTTP surface.
//!
//! | Route | Method | Body | Reply |
//! |---|---|---|---|
//! | `/upload` | POST | multipart, field `file` | `{filename, file_path, transcript}` |
//! | `/chat` | POST | `{"message": "..."}` | `{"response": "..."}` |
//! | `/clear_history` | GET, POST | none | `{"message": "..."}` |
//! | `/quiz` | GET | none | quiz JSON, or `{"response": "..."}` without a transcript |
//! | `/health` | GET | none | `{"status": "ok", "sessions": N, ...}` |
//!
//! The conversation is chosen by the `x-session-id` header (default
//! `default`). Errors are `{"detail": "..."}` with the status from
//! [`error::status_for`].

pub mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, FromRequestParts, Multipart, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::assistant::{
    QuizOutcome, UploadReceipt, VideoAssistant, CLEARED_MESSAGE, NO_TRANSCRIPT_MESSAGE,
};
use crate::error::{ClipchatError, Result};
use crate::log_component;
use crate::session::{SessionManager, DEFAULT_SESSION_KEY};

pub use error::{status_for, ApiError};

/// Header carrying the session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<VideoAssistant>,
}

/// Session key taken from the `x-session-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match parts.headers.get(SESSION_HEADER) {
            None => Ok(SessionId(DEFAULT_SESSION_KEY.to_string())),
            Some(value) => {
                let key = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("x-session-id must be visible ASCII"))?
                    .trim();
                if key.is_empty() {
                    Ok(SessionId(DEFAULT_SESSION_KEY.to_string()))
                } else {
                    Ok(SessionId(key.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Build the router for `assistant`.
pub fn router(assistant: Arc<VideoAssistant>) -> Router {
    let body_limit = assistant
        .settings()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/upload", post(upload))
        .route("/upload/", post(upload))
        .route("/chat", post(chat))
        .route("/clear_history", get(clear_history).post(clear_history))
        .route("/quiz", get(quiz))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { assistant })
}

async fn upload(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    mut multipart: Multipart,
) -> std::result::Result<Json<UploadReceipt>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::bad_request("uploaded file has no name"));
        }
        let bytes = field.bytes().await?;
        let receipt = state
            .assistant
            .upload(&session, &file_name, bytes.to_vec())
            .await?;
        return Ok(Json(receipt));
    }
    Err(ApiError::bad_request("missing multipart field 'file'"))
}

async fn chat(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let outcome = state.assistant.chat(&session, &request.message).await?;
    Ok(Json(ChatResponse {
        response: outcome.text().to_string(),
    }))
}

async fn clear_history(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    state.assistant.clear(&session).await?;
    Ok(Json(json!({ "message": CLEARED_MESSAGE })))
}

async fn quiz(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> std::result::Result<Response, ApiError> {
    match state.assistant.quiz(&session).await? {
        QuizOutcome::Quiz(quiz) => Ok(Json(quiz).into_response()),
        QuizOutcome::NoTranscript => {
            Ok(Json(json!({ "response": NO_TRANSCRIPT_MESSAGE })).into_response())
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let budget = state.assistant.budget();
    Json(json!({
        "status": "ok",
        "sessions": state.assistant.sessions().len().await,
        "token_counter": budget.counter_name(),
        "token_counter_degraded": budget.is_degraded(),
    }))
}

/// Periodically drop sessions idle for longer than `idle_secs`.
///
/// Returns `None` when `idle_secs` is 0 (eviction disabled).
pub fn spawn_idle_eviction(sessions: SessionManager, idle_secs: u64) -> Option<JoinHandle<()>> {
    if idle_secs == 0 {
        return None;
    }
    let max_idle = Duration::from_secs(idle_secs);
    let period = Duration::from_secs((idle_secs / 4).clamp(1, 300));
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sessions.evict_idle(max_idle).await;
        }
    }))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(
    assistant: Arc<VideoAssistant>,
    addr: SocketAddr,
    session_idle_secs: u64,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let evictor = spawn_idle_eviction(assistant.sessions().clone(), session_idle_secs);

    log_component!(
        info,
        "gateway",
        "Listening",
        addr = local.to_string(),
        session_idle_secs = session_idle_secs,
    );

    let result = axum::serve(listener, router(assistant))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ClipchatError::Io);

    if let Some(handle) = evictor {
        handle.abort();
    }
    log_component!(info, "gateway", "Server stopped");
    result
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}
