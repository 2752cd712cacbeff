//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Trap
        .route("/api/v1/collect", get(handlers::collect))
        .route("/api/v1/should-respond", post(handlers::should_respond))

        // Relay
        .route("/api/v1/broadcast", post(handlers::broadcast))
        .route("/api/v1/stream", get(handlers::stream_alerts))

        // Scheduler
        .route("/api/v1/status", get(handlers::status))

        .with_state(state)
}
