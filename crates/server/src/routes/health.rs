use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Configured matrix geometry, e.g. `32x32`.
    pub matrix: String,
    /// Whether a job is currently on the display.
    pub busy: bool,
    /// Number of jobs waiting behind it.
    pub queue_depth: usize,
}

/// GET /health -- returns service and dispatcher health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatch = state.dispatcher.status().await.ok();

    let status = if dispatch.is_some() { "ok" } else { "degraded" };
    let (busy, queue_depth) = dispatch
        .map(|d| (d.busy, d.queue_depth))
        .unwrap_or_default();

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        matrix: format!("{}x{}", state.config.width, state.config.height),
        busy,
        queue_depth,
    })
}

/// Mount health check routes (intended for root-level).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
