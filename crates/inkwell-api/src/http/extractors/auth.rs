//! User identification extractor.
//!
//! The service runs behind a gateway that authenticates users and forwards
//! the verified identity in the `X-User-Id` header. Every per-user route
//! extracts [`UserId`]; requests without the header are rejected.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::AppError;
use crate::state::AppState;

/// Maximum accepted user id length, to keep storage keys bounded.
const MAX_USER_ID_LEN: usize = 128;

/// The authenticated user's identity, taken from `X-User-Id`.
pub struct UserId(pub String);

impl FromRequestParts<AppState> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get("x-user-id") else {
            return Err(AppError::Unauthorized(
                "Missing user identity. Provide the 'X-User-Id' header.".to_string(),
            ));
        };

        let user_id = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid X-User-Id header encoding".to_string()))?
            .trim();

        if user_id.is_empty() {
            return Err(AppError::Unauthorized(
                "X-User-Id header must not be empty".to_string(),
            ));
        }
        if user_id.len() > MAX_USER_ID_LEN {
            return Err(AppError::Unauthorized(format!(
                "X-User-Id header exceeds {MAX_USER_ID_LEN} characters"
            )));
        }

        Ok(UserId(user_id.to_string()))
    }
}
