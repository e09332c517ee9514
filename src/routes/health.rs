use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    generative_backend_enabled: bool,
    generative_backend_ready: bool,
    queue_target: usize,
    active_sessions: usize,
    uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        generative_backend_enabled: state.backend().is_enabled(),
        generative_backend_ready: state.backend().is_ready(),
        queue_target: state.practice().queue_target(),
        active_sessions: state.practice().store().len(),
        uptime_seconds: state.started_at().elapsed().as_secs(),
    })
}
