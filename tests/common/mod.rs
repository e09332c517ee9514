#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use adaptive_math_backend::config::Config;
use adaptive_math_backend::create_app_with;
use adaptive_math_backend::services::llm_provider::GenerativeBackend;
use adaptive_math_backend::state::AppState;

pub fn test_config() -> Config {
    Config {
        queue_target: 2,
        ..Config::default()
    }
}

pub fn create_test_app() -> Router {
    create_app_with(AppState::new(test_config(), Arc::new(GenerativeBackend::disabled())))
}

pub fn create_test_app_with_backend(backend: Arc<GenerativeBackend>) -> Router {
    create_app_with(AppState::new(test_config(), backend))
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
