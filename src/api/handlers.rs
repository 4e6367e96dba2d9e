//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::{error_stream, reveal_stream};
use super::types::{
    CancelResponse, ChatRequest, ConfigResponse, ErrorResponse, KeyRequest, OpeningResponse,
    SessionCreatedResponse, SessionResponse, StepInfo, SuccessResponse,
};
use super::AppState;
use crate::driver::DriverError;
use crate::llm::LlmError;
use crate::locale::connection_error;
use crate::runtime::SessionHandle;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the page
        .route("/", get(serve_page))
        // Static assets (embedded)
        .route("/assets/*path", get(serve_static))
        // Page configuration
        .route("/api/config", get(get_config))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        // Conversation
        .route("/api/sessions/:id/open", post(open_session))
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_page() -> Response {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        page: state.page.as_ref().clone(),
        contacts: state.config.contacts.clone(),
        needs_api_key: !state.config.has_server_key(),
        typing_delay_ms: u64::try_from(state.config.pacing.per_chunk.as_millis())
            .unwrap_or(u64::MAX),
        model: state.config.model.clone(),
    })
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionCreatedResponse> {
    let (session_id, _) = state.sessions.create().await;
    Json(SessionCreatedResponse { session_id })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionResponse::of(&session)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.remove(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    handle.cancel();
    Ok(Json(CancelResponse { ok: true }))
}

// ============================================================
// Conversation
// ============================================================

/// Let the assistant speak first. Non-streamed: the page shows a spinner
/// until the whole opening message is back.
async fn open_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<OpeningResponse>, AppError> {
    let handle = find_session(&state, &id).await?;
    let (mut session, cancel) = handle.try_begin().ok_or(AppError::Busy)?;

    if !session.first_run_pending() {
        return Ok(Json(OpeningResponse {
            message: None,
            progress: StepInfo::of(session.step()),
        }));
    }

    let mut driver = state.driver(req.api_key.as_deref(), session.all())?;
    let message = driver
        .opening_turn(&mut session, &cancel)
        .await
        .map_err(AppError::from)?;

    Ok(Json(OpeningResponse {
        message,
        progress: StepInfo::of(session.step()),
    }))
}

/// Send the user's text and stream the reply back as SSE
async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }

    let handle = find_session(&state, &id).await?;
    let (mut session, cancel) = handle.try_begin().ok_or(AppError::Busy)?;

    let mut driver = state.driver(req.api_key.as_deref(), session.all())?;
    let outcome = driver.respond(&mut session, &req.text, &cancel).await;
    // The reveal does not need the session
    drop(session);

    match outcome {
        Ok(reply) => Ok(reveal_stream(reply).into_response()),
        Err(DriverError::RemoteCall(e)) => Ok(error_stream(&e).into_response()),
        Err(e @ DriverError::Configuration(_)) => Err(e.into()),
    }
}

async fn find_session(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("sos-calma ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Configuration(String),
    NotFound(String),
    Busy,
    RemoteCall(LlmError),
}

impl From<DriverError> for AppError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Configuration(msg) => AppError::Configuration(msg),
            DriverError::RemoteCall(e) => AppError::RemoteCall(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg, None)),
            AppError::Configuration(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(msg, Some("configuration")),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg, None)),
            AppError::Busy => (
                StatusCode::CONFLICT,
                ErrorResponse::new("A reply is already in progress", Some("busy")),
            ),
            AppError::RemoteCall(e) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new(connection_error(&e.message), Some(e.kind.as_str())),
            ),
        };

        (status, Json(body)).into_response()
    }
}
