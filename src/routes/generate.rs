use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::grading::coerce_int;
use crate::services::level_config::clamp_level;
use crate::services::problem::Problem;
use crate::state::AppState;

use super::{parse_locale, parse_op};

const DEFAULT_COUNT: i64 = 10;
const MAX_COUNT: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    op: Option<String>,
    count: Option<Value>,
    level: Option<Value>,
    locale: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    problems: Vec<Problem>,
}

async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let op = parse_op(payload.op.as_deref());
    let locale = parse_locale(payload.locale.as_deref());
    let count = payload
        .count
        .as_ref()
        .and_then(coerce_int)
        .unwrap_or(DEFAULT_COUNT)
        .clamp(1, MAX_COUNT) as usize;
    let level = clamp_level(payload.level.as_ref().and_then(coerce_int).unwrap_or(1));

    let problems = state
        .generator()
        .generate_batch(op, level, locale, count)
        .await;
    Json(GenerateResponse { problems })
}
