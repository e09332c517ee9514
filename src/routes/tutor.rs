use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::response::AppError;
use crate::services::tutor::{explain, TutorExplanation};
use crate::state::AppState;

use super::parse_locale;

pub fn router() -> Router<AppState> {
    Router::new().route("/tutor", post(tutor))
}

#[derive(Debug, Default, Deserialize)]
struct TutorRequest {
    expression: Option<Value>,
    locale: Option<String>,
}

async fn tutor(
    Json(payload): Json<TutorRequest>,
) -> Result<Json<TutorExplanation>, AppError> {
    let locale = parse_locale(payload.locale.as_deref());
    // Non-string expressions count as missing.
    let expression = payload
        .expression
        .as_ref()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    match explain(expression, locale) {
        Ok(explanation) => Ok(Json(explanation)),
        Err(err) => {
            debug!(error = %err, "tutor rejected expression");
            Err(AppError::bad_request(err.message(locale)))
        }
    }
}
