use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::response::AppError;
use crate::services::grading::{grade_detached, DetachedGrade};
use crate::state::AppState;

use super::{parse_locale, parse_op};

pub fn router() -> Router<AppState> {
    Router::new().route("/grade", post(grade))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeRequest {
    op: Option<String>,
    a: Option<Value>,
    b: Option<Value>,
    user_answer: Option<Value>,
    locale: Option<String>,
}

async fn grade(Json(payload): Json<GradeRequest>) -> Result<Json<DetachedGrade>, AppError> {
    let op = parse_op(payload.op.as_deref());
    let locale = parse_locale(payload.locale.as_deref());
    let answer = payload.user_answer.unwrap_or(Value::Null);

    let graded = grade_detached(
        op,
        payload.a.as_ref(),
        payload.b.as_ref(),
        &answer,
        locale,
        &mut rand::rng(),
    );
    match graded {
        Ok(graded) => Ok(Json(graded)),
        Err(err) => {
            debug!(error = %err, op = op.as_str(), "grade alias rejected operands");
            Err(AppError::bad_request(err.message(locale)))
        }
    }
}
