//! Chat endpoints.
//!
//! The two streaming routes return chunked `text/plain` bodies: the model
//! output is relayed as-is, and abnormal endings (user stop, upstream
//! failure) arrive as inline text markers so the client never sees a
//! broken response mid-stream. The admitted request's ticket id is
//! returned in the `X-Request-Id` header for stop calls.
//!
//! Everything else is enveloped JSON.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::response::Response;
use axum::Json;
use futures_util::StreamExt;

use inkwell_core::chat::ChatStreamHandle;
use inkwell_core::tokens::units_to_words;
use inkwell_types::chat::{
    ActiveRequest, AdmissionSnapshot, ByoChatRequest, ChatRequest, ChatTurn, UsageReport,
};
use inkwell_types::llm::ModelEntry;

use crate::http::error::AppError;
use crate::http::extractors::auth::UserId;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/chat/stream — managed, metered chat stream.
pub async fn stream_chat(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let handle = state.orchestrator.stream_chat(&user_id, body).await?;
    stream_response(handle)
}

/// POST /api/v1/chat/byo/stream — chat stream on the caller's own account.
pub async fn stream_chat_byo(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<ByoChatRequest>,
) -> Result<Response, AppError> {
    let handle = state.orchestrator.stream_chat_byo(&user_id, body).await?;
    stream_response(handle)
}

/// Turn an admitted stream handle into a chunked plain-text response.
fn stream_response(handle: ChatStreamHandle) -> Result<Response, AppError> {
    let ticket_header = HeaderValue::from_str(&handle.ticket_id)
        .map_err(|_| AppError::Internal("ticket id is not header-safe".to_string()))?;

    let byte_stream = handle
        .stream
        .map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));

    let mut response = Response::new(Body::from_stream(byte_stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // Disables proxy buffering so chunks reach the client as they arrive.
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers.insert(HeaderName::from_static("x-request-id"), ticket_header);
    Ok(response)
}

/// GET /api/v1/chat/models — the model catalog.
pub async fn list_models(State(state): State<AppState>) -> ApiResponse<Vec<ModelEntry>> {
    ApiResponse::success(state.orchestrator.models())
}

/// Usage payload with both unit and word views of the daily quota.
#[derive(serde::Serialize)]
pub struct UsagePayload {
    pub units: UsageReport,
    pub words_used: u64,
    pub words_limit: u64,
    pub words_remaining: u64,
    pub percent_used: f64,
    pub can_use: bool,
}

impl From<UsageReport> for UsagePayload {
    fn from(units: UsageReport) -> Self {
        let percent_used = if units.limit == 0 {
            100.0
        } else {
            (units.used as f64 / units.limit as f64 * 100.0).min(100.0)
        };
        Self {
            words_used: units_to_words(units.used),
            words_limit: units_to_words(units.limit),
            words_remaining: units_to_words(units.remaining),
            percent_used,
            can_use: units.used < units.limit,
            units,
        }
    }
}

/// GET /api/v1/chat/usage — today's metered usage for the user.
pub async fn get_usage(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResponse<UsagePayload> {
    ApiResponse::success(state.orchestrator.usage_report(&user_id).await.into())
}

/// GET /api/v1/chat/history — the user's stored conversation.
pub async fn get_history(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<ApiResponse<Vec<ChatTurn>>, AppError> {
    Ok(ApiResponse::success(
        state.orchestrator.history(&user_id).await?,
    ))
}

/// POST /api/v1/chat/clear — delete the user's conversation history.
pub async fn clear_history(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    state.orchestrator.clear_history(&user_id).await?;
    Ok(ApiResponse::success(serde_json::json!({ "cleared": true })))
}

/// POST /api/v1/chat/stop — stop all of the user's in-flight requests.
pub async fn stop_all(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResponse<serde_json::Value> {
    let stopped = state.orchestrator.stop_all(&user_id);
    ApiResponse::success(serde_json::json!({
        "stopped": stopped.len(),
        "stopped_request_ids": stopped,
    }))
}

/// POST /api/v1/chat/requests/{ticket_id}/stop — stop one request.
///
/// 404 when the ticket is unknown or belongs to another user; the two
/// cases are indistinguishable on purpose.
pub async fn stop_request(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(ticket_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    if !state.orchestrator.stop_ticket(&user_id, &ticket_id) {
        return Err(AppError::NotFound(format!(
            "No in-flight request with id '{ticket_id}'"
        )));
    }
    Ok(ApiResponse::success(serde_json::json!({ "stopped": true })))
}

/// GET /api/v1/chat/requests — the user's in-flight requests.
pub async fn list_requests(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResponse<Vec<ActiveRequest>> {
    ApiResponse::success(state.orchestrator.active_requests(&user_id))
}

/// GET /api/v1/chat/admission — current service load.
pub async fn get_admission(State(state): State<AppState>) -> ApiResponse<AdmissionSnapshot> {
    ApiResponse::success(state.orchestrator.admission_snapshot())
}
