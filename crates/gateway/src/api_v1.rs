//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/sessions`               Start a session
//! - `DELETE /v1/sessions/{id}`          End a session and discard its history
//! - `GET    /v1/sessions/{id}/history`  Committed messages of a session
//! - `POST   /v1/sessions/{id}/turns`    Submit a message, get an SSE stream of turn events
//! - `GET    /v1/indicators?q=...`       Economic context for a query
//! - `POST   /v1/index/reload`           Rebuild the document index
//! - `GET    /v1/status`                 Model, retrieval and session status

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{delete, get, post},
};
use chrono::Utc;
use finanbot_agent::{WELCOME_MESSAGE, retrieval_status};
use finanbot_core::message::{Message, Role};
use finanbot_economy::{EconomicIntent, EconomicSnapshot, format_context};
use finanbot_retrieval::IndexStats;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::SharedState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn session_not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Session not found: {id}"))
}

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", delete(end_session_handler))
        .route("/sessions/{id}/history", get(history_handler))
        .route("/sessions/{id}/turns", post(submit_turn_handler))
        .route("/indicators", get(indicators_handler))
        .route("/index/reload", post(reload_index_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub created_at: String,
    pub welcome: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDto {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
            timestamp: m.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<MessageDto>,
}

#[derive(Debug, Deserialize)]
struct TurnRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IndicatorsQuery {
    q: String,
}

#[derive(Debug, Serialize)]
struct IndicatorsResponse {
    query: String,
    intent: Option<EconomicIntent>,
    context: String,
    snapshots: Vec<EconomicSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub total_chunks: usize,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    version: &'static str,
    provider: String,
    model: String,
    uptime_secs: i64,
    active_sessions: usize,
    retrieval_active: bool,
    retrieval: Option<IndexStats>,
    statistics_enabled: bool,
}

// ── Sessions ──────────────────────────────────────────────────────────────

/// `POST /v1/sessions`
async fn create_session_handler(
    State(state): State<SharedState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = state.service.start_session().await;
    let created_at = session.conversation.lock().await.created_at.to_rfc3339();

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.to_string(),
            created_at,
            welcome: WELCOME_MESSAGE.to_string(),
            status: retrieval_status(state.index.is_some(), &state.documents_dir),
        }),
    )
}

/// `DELETE /v1/sessions/{id}`
async fn end_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.service.end_session(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// `GET /v1/sessions/{id}/history`
async fn history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state
        .service
        .history(&id)
        .await
        .ok_or_else(|| session_not_found(&id))?;

    Ok(Json(HistoryResponse {
        session_id: id,
        messages: messages.iter().map(MessageDto::from).collect(),
    }))
}

// ── Turns ─────────────────────────────────────────────────────────────────

/// `POST /v1/sessions/{id}/turns`: one SSE event per [`TurnEvent`], named by
/// its type. The stream ends after the terminal event. Closing the
/// connection early cancels the turn without committing it.
///
/// [`TurnEvent`]: finanbot_agent::TurnEvent
async fn submit_turn_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<TurnRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let session = state
        .service
        .sessions()
        .get(&id)
        .await
        .ok_or_else(|| session_not_found(&id))?;

    info!(session_id = %id, message_len = payload.message.len(), "v1 turn request");

    let stream = state
        .service
        .submit_turn(session, payload.message)
        .await
        .map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok(SseEvent::default().event(event.event_type()).data(data))
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── Indicators ────────────────────────────────────────────────────────────

/// `GET /v1/indicators?q=...`
async fn indicators_handler(
    State(state): State<SharedState>,
    Query(query): Query<IndicatorsQuery>,
) -> Result<Json<IndicatorsResponse>, ApiError> {
    let economy = state.economy.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Economic statistics are disabled",
        )
    })?;

    let (intent, snapshots) = match economy.lookup(&query.q).await {
        Some((intent, snapshots)) => (Some(intent), snapshots),
        None => (None, Vec::new()),
    };

    Ok(Json(IndicatorsResponse {
        context: format_context(&snapshots),
        query: query.q,
        intent,
        snapshots,
    }))
}

// ── Index ─────────────────────────────────────────────────────────────────

/// `POST /v1/index/reload`
async fn reload_index_handler(
    State(state): State<SharedState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let index = state.index.as_ref().ok_or_else(|| {
        api_error(StatusCode::NOT_FOUND, "Document retrieval is not active")
    })?;

    let total_chunks = index.reload().await.map_err(|e| {
        warn!(error = %e, "Index reload failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(ReloadResponse { total_chunks }))
}

// ── Status ────────────────────────────────────────────────────────────────

/// `GET /v1/status`
async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let retrieval = match &state.index {
        Some(index) => Some(index.stats().await),
        None => None,
    };

    Json(StatusResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider_name.clone(),
        model: state.service.orchestrator().model().to_string(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        active_sessions: state.service.sessions().count().await,
        retrieval_active: retrieval.is_some(),
        retrieval,
        statistics_enabled: state.economy.is_some(),
    })
}
