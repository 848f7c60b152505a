//! HTTP/REST API layer for Inkwell.
//!
//! Axum-based REST API at `/api/v1/` with per-user identification,
//! envelope response format, and CORS support. Chat responses stream as
//! chunked plain text.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
