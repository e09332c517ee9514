use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::AppError;
use crate::services::practice::{GradedAnswer, ServedProblem, StartedSession};
use crate::services::problem::OperationKind;
use crate::state::AppState;

use super::{parse_locale, parse_op};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session/start", post(start))
        .route("/session/next", post(next))
        .route("/session/grade", post(grade))
        .route("/session/end", post(end))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    op: Option<String>,
    locale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextRequest {
    session_id: Option<String>,
    op: Option<String>,
    locale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeRequest {
    session_id: Option<String>,
    user_answer: Option<Value>,
    locale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndRequest {
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndResponse {
    session_id: String,
    ended: bool,
}

async fn start(
    State(state): State<AppState>,
    Json(payload): Json<StartRequest>,
) -> Json<StartedSession> {
    let op = parse_op(payload.op.as_deref());
    let locale = parse_locale(payload.locale.as_deref());
    Json(state.practice().start_session(op, locale).await)
}

async fn next(
    State(state): State<AppState>,
    Json(payload): Json<NextRequest>,
) -> Result<Json<ServedProblem>, AppError> {
    let session_id = payload.session_id.unwrap_or_default();
    // Only a recognized op retargets the session.
    let op = payload.op.as_deref().and_then(OperationKind::parse);
    let locale = parse_locale(payload.locale.as_deref());

    let served = state
        .practice()
        .next_problem(&session_id, op, locale)
        .await?;
    Ok(Json(served))
}

async fn grade(
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<GradedAnswer>, AppError> {
    let session_id = payload.session_id.unwrap_or_default();
    let answer = payload.user_answer.unwrap_or(Value::Null);
    let locale = parse_locale(payload.locale.as_deref());

    let graded = state
        .practice()
        .grade_answer(&session_id, &answer, locale)
        .await?;
    Ok(Json(graded))
}

async fn end(
    State(state): State<AppState>,
    Json(payload): Json<EndRequest>,
) -> Result<Json<EndResponse>, AppError> {
    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Invalid sessionId"))?;
    let ended = state.practice().end_session(&session_id);
    Ok(Json(EndResponse { session_id, ended }))
}
