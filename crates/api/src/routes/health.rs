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
    /// Whether the pose estimator is initialised and sessions are accepted.
    pub pose_ready: bool,
    /// Whether a secondary pose model is available for enhancement.
    pub enhancement: bool,
    /// Number of registered interactive sessions.
    pub active_sessions: usize,
    /// Storage backend label.
    pub store: &'static str,
    /// Whether the storage backend is reachable.
    pub store_healthy: bool,
}

/// GET /health -- returns service, pose and storage health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.store.health_check().await.is_ok();
    let pose_ready = state.pipeline.is_some() && state.sessions.is_ready();
    let enhancement = state
        .pipeline
        .as_ref()
        .is_some_and(|p| p.estimator().capabilities().enhancement);

    let status = if store_healthy && pose_ready { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        pose_ready,
        enhancement,
        active_sessions: state.sessions.session_count().await,
        store: state.store.backend(),
        store_healthy,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
