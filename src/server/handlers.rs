use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::server::state::StatusState;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Latest controller snapshot
pub async fn status(State(state): State<StatusState>) -> impl IntoResponse {
    Json(state.snapshot())
}

/// Effective scaling configuration
pub async fn config(State(state): State<StatusState>) -> impl IntoResponse {
    Json(state.config.as_ref().clone())
}

/// Create the Axum router
pub fn create_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/config", get(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
