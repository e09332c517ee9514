mod generate;
mod grade;
mod health;
mod sessions;
mod tutor;

use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::AppError;
use crate::services::problem::{Locale, OperationKind};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(sessions::router())
        .merge(generate::router())
        .merge(grade::router())
        .merge(tutor::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    AppError::not_found("Route not found").into_response()
}

/// Unknown or missing operation names fall back to addition.
fn parse_op(raw: Option<&str>) -> OperationKind {
    raw.and_then(OperationKind::parse).unwrap_or_default()
}

fn parse_locale(raw: Option<&str>) -> Locale {
    Locale::parse(raw.filter(|s| !s.is_empty()))
}
