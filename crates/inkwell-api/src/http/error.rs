//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use inkwell_types::error::ChatError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat pipeline errors.
    Chat(ChatError),
    /// Authentication failure.
    Unauthorized(String),
    /// Requested resource does not exist.
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::MessageTooLong { .. }) => {
                (StatusCode::BAD_REQUEST, "MESSAGE_TOO_LONG", e.to_string())
            }
            AppError::Chat(e @ ChatError::InputTooLong) => {
                (StatusCode::BAD_REQUEST, "INPUT_TOO_LONG", e.to_string())
            }
            AppError::Chat(ChatError::UnsupportedModel(model)) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_MODEL",
                format!("Model '{model}' is not offered"),
            ),
            AppError::Chat(e @ ChatError::QuotaExceeded { .. }) => {
                (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED", e.to_string())
            }
            AppError::Chat(e @ ChatError::ServerBusy { snapshot }) => {
                details = Some(json!({
                    "active": snapshot.active,
                    "queued": snapshot.queued,
                    "max_concurrent": snapshot.max_concurrent,
                    "queue_capacity": snapshot.queue_capacity,
                }));
                (StatusCode::TOO_MANY_REQUESTS, "SERVER_BUSY", e.to_string())
            }
            AppError::Chat(e @ ChatError::StoppedByUser) => {
                (StatusCode::CONFLICT, "STOPPED", e.to_string())
            }
            AppError::Chat(ChatError::UpstreamProvider(msg)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::Storage(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                e.to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }
        let body = json!({
            "data": null,
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
            "errors": [error]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
