//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Streaming chat
        .route("/chat/stream", post(handlers::chat::stream_chat))
        .route("/chat/byo/stream", post(handlers::chat::stream_chat_byo))
        // Catalog and per-user views
        .route("/chat/models", get(handlers::chat::list_models))
        .route("/chat/usage", get(handlers::chat::get_usage))
        .route("/chat/history", get(handlers::chat::get_history))
        .route("/chat/clear", post(handlers::chat::clear_history))
        // Request control
        .route("/chat/stop", post(handlers::chat::stop_all))
        .route(
            "/chat/requests/{ticket_id}/stop",
            post(handlers::chat::stop_request),
        )
        .route("/chat/requests", get(handlers::chat::list_requests))
        .route("/chat/admission", get(handlers::chat::get_admission));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - health check with current load (no auth required).
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    let snapshot = state.orchestrator.admission_snapshot();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "admission": snapshot,
    }))
}
