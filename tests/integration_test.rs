use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use futures::future::join_all;
use serde_json::{json, Value};

use adaptive_math_backend::services::llm_provider::{GenerativeBackend, LLMError, TextGenerator};

mod common;

fn answer_for(problem: &Value) -> Value {
    let solution = &problem["solution"];
    match (solution.get("n"), solution.get("d")) {
        (Some(n), Some(d)) => json!(format!("{n}/{d}")),
        _ => solution.clone(),
    }
}

async fn start_session(app: &axum::Router, op: &str) -> String {
    let (status, body) =
        common::post_json(app, "/session/start", json!({"op": op, "locale": "en"})).await;
    assert_eq!(status, StatusCode::OK);
    body["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = common::create_test_app();
    let (status, body) = common::get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["generativeBackendEnabled"], false);
    assert_eq!(body["generativeBackendReady"], false);
    assert_eq!(body["queueTarget"], 2);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = common::create_test_app();
    let (status, body) = common::get(&app, "/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_session_start_defaults_to_add() {
    let app = common::create_test_app();
    let (status, body) = common::post_json(&app, "/session/start", json!({"op": "pow"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["sessionId"].as_str().unwrap().starts_with("sess-"));
    assert_eq!(
        body["state"],
        json!({"op": "add", "level": 1, "streak": 0, "correct": 0, "wrong": 0})
    );
}

#[tokio::test]
async fn test_session_flow_levels_up_after_three_correct() {
    let app = common::create_test_app();
    let session_id = start_session(&app, "mul").await;

    let mut state = Value::Null;
    for _ in 0..3 {
        let (status, next) = common::post_json(
            &app,
            "/session/next",
            json!({"sessionId": session_id, "locale": "en"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let problem = &next["problem"];
        assert_eq!(problem["op"], "mul");

        let (status, graded) = common::post_json(
            &app,
            "/session/grade",
            json!({"sessionId": session_id, "userAnswer": answer_for(problem), "locale": "en"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(graded["correct"], true);
        assert_eq!(graded["feedback"], "Great job! Correct answer.");
        assert!(graded["nextProblemPreview"]["id"].is_string());
        state = graded["state"].clone();
    }

    assert_eq!(state["level"], 2);
    assert_eq!(state["streak"], 0);
    assert_eq!(state["correct"], 3);
}

#[tokio::test]
async fn test_next_serves_the_graded_preview() {
    let app = common::create_test_app();
    let session_id = start_session(&app, "add").await;

    common::post_json(&app, "/session/next", json!({"sessionId": session_id})).await;
    let (_, graded) = common::post_json(
        &app,
        "/session/grade",
        json!({"sessionId": session_id, "userAnswer": "not a number"}),
    )
    .await;
    assert_eq!(graded["correct"], false);
    assert!(graded["feedback"].as_str().unwrap().starts_with("Casi."));
    assert_eq!(graded["state"]["wrong"], 1);

    let (_, next) =
        common::post_json(&app, "/session/next", json!({"sessionId": session_id})).await;
    assert_eq!(next["problem"]["id"], graded["nextProblemPreview"]["id"]);
}

#[tokio::test]
async fn test_fraction_session_grades_equivalent_fractions() {
    let app = common::create_test_app();
    let session_id = start_session(&app, "frac").await;

    let (_, next) =
        common::post_json(&app, "/session/next", json!({"sessionId": session_id})).await;
    let solution = &next["problem"]["solution"];
    let (n, d) = (solution["n"].as_i64().unwrap(), solution["d"].as_i64().unwrap());

    let (_, graded) = common::post_json(
        &app,
        "/session/grade",
        json!({
            "sessionId": session_id,
            "userAnswer": format!("{}/{}", n * 2, d * 2),
            "locale": "en"
        }),
    )
    .await;
    assert_eq!(graded["correct"], true);
    assert_eq!(graded["expected"], format!("{n}/{d}"));
}

#[tokio::test]
async fn test_next_retargets_operation() {
    let app = common::create_test_app();
    let session_id = start_session(&app, "add").await;

    let (_, next) = common::post_json(
        &app,
        "/session/next",
        json!({"sessionId": session_id, "op": "sequence"}),
    )
    .await;
    assert_eq!(next["problem"]["op"], "seq");
    assert_eq!(next["state"]["op"], "seq");
    assert!(next["problem"]["meta"]["visibleTerms"].is_number());
}

#[tokio::test]
async fn test_invalid_session_is_bad_request() {
    let app = common::create_test_app();

    let (status, body) =
        common::post_json(&app, "/session/next", json!({"sessionId": "sess-missing"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid sessionId");

    let (status, body) = common::post_json(&app, "/session/grade", json!({"userAnswer": 3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid session or no last problem");
}

#[tokio::test]
async fn test_grade_without_served_problem_is_bad_request() {
    let app = common::create_test_app();
    let session_id = start_session(&app, "add").await;

    let (status, _) = common::post_json(
        &app,
        "/session/grade",
        json!({"sessionId": session_id, "userAnswer": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_end() {
    let app = common::create_test_app();
    let session_id = start_session(&app, "div").await;

    let (status, body) =
        common::post_json(&app, "/session/end", json!({"sessionId": session_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], true);

    let (status, _) =
        common::post_json(&app, "/session/next", json!({"sessionId": session_id})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = common::post_json(&app, "/session/end", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_clamps_count_and_level() {
    let app = common::create_test_app();

    let (status, body) =
        common::post_json(&app, "/generate", json!({"op": "sub", "count": 500, "level": 9})).await;
    assert_eq!(status, StatusCode::OK);
    let problems = body["problems"].as_array().unwrap();
    assert_eq!(problems.len(), 200);
    for p in problems {
        let (a, b) = (p["a"].as_i64().unwrap(), p["b"].as_i64().unwrap());
        assert!(a >= b && a <= 999);
        assert_eq!(p["solution"].as_i64().unwrap(), a - b);
    }

    let (_, body) = common::post_json(&app, "/generate", json!({"count": 0})).await;
    assert_eq!(body["problems"].as_array().unwrap().len(), 1);

    let (_, body) = common::post_json(&app, "/generate", json!({})).await;
    let problems = body["problems"].as_array().unwrap();
    assert_eq!(problems.len(), 10);
    assert!(problems.iter().all(|p| p["op"] == "add"));
}

#[tokio::test]
async fn test_generate_divisions_are_exact() {
    let app = common::create_test_app();
    let (_, body) =
        common::post_json(&app, "/generate", json!({"op": "div", "count": 50, "level": "5"})).await;

    for p in body["problems"].as_array().unwrap() {
        let (a, b) = (p["a"].as_i64().unwrap(), p["b"].as_i64().unwrap());
        assert!(b >= 1);
        assert_eq!(a % b, 0);
        assert_eq!(p["solution"].as_i64().unwrap(), a / b);
    }
}

#[tokio::test]
async fn test_grade_alias() {
    let app = common::create_test_app();

    let (status, body) = common::post_json(
        &app,
        "/grade",
        json!({"op": "sub", "a": 4, "b": 10, "userAnswer": "6", "locale": "en"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
    assert_eq!(body["expected"], 6);
    assert_eq!(body["nextHint"], "");

    let (_, body) = common::post_json(
        &app,
        "/grade",
        json!({"op": "div", "a": 9, "b": 0, "userAnswer": 1}),
    )
    .await;
    assert_eq!(body["correct"], false);
    assert_eq!(body["expected"], 9);
    assert_eq!(body["feedback"], "Casi. 9 ÷ 1 = 9.");

    let (_, body) =
        common::post_json(&app, "/grade", json!({"op": "frac", "userAnswer": "x"})).await;
    assert_eq!(body["op"], "frac");
    assert_eq!(body["correct"], false);
    assert!(body["expected"].as_str().unwrap().contains('/'));
}

#[tokio::test]
async fn test_grade_alias_rejects_out_of_range_operands() {
    let app = common::create_test_app();

    let (status, body) = common::post_json(
        &app,
        "/grade",
        json!({
            "op": "mul",
            "a": 9_000_000_000_000_000_000u64,
            "b": 9_000_000_000u64,
            "userAnswer": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().starts_with("Operando fuera de rango"));

    let (status, body) = common::post_json(
        &app,
        "/grade",
        json!({"op": "add", "a": -5e18, "b": -5e18, "userAnswer": 0, "locale": "en"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Operand out of range"));

    let (status, body) = common::post_json(
        &app,
        "/grade",
        json!({"op": "mul", "a": 1_000_000_000, "b": -1_000_000_000, "userAnswer": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expected"], -1_000_000_000_000_000_000i64);
}

#[tokio::test]
async fn test_tutor() {
    let app = common::create_test_app();

    let (status, body) =
        common::post_json(&app, "/tutor", json!({"expression": "56/8", "locale": "en"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questionText"], "What is 56 ÷ 8?");
    assert_eq!(body["solution"], 7);
    assert_eq!(body["steps"].as_array().unwrap().len(), 3);

    let (status, body) =
        common::post_json(&app, "/tutor", json!({"expression": "3 / 0", "locale": "en"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot divide by 0.");

    let (status, _) = common::post_json(&app, "/tutor", json!({"expression": 42})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = common::post_json(&app, "/tutor", json!({"expression": "what?"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

struct Phrasing;

#[async_trait]
impl TextGenerator for Phrasing {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LLMError> {
        Ok(r#"```json
{"problems":[{"questionText":"Can you add these?","solution":-1,"difficulty":"difícil"}]}
```"#
            .to_string())
    }
}

#[tokio::test]
async fn test_generate_with_ready_backend() {
    let backend = Arc::new(GenerativeBackend::new(Arc::new(Phrasing), 64));
    backend.initialize().await;
    let app = common::create_test_app_with_backend(backend);

    let (_, health) = common::get(&app, "/health").await;
    assert_eq!(health["generativeBackendReady"], true);

    let (_, body) = common::post_json(&app, "/generate", json!({"op": "add", "count": 3})).await;
    for p in body["problems"].as_array().unwrap() {
        assert_eq!(p["questionText"], "Can you add these?");
        assert_eq!(p["difficulty"], "hard");
        let (a, b) = (p["a"].as_i64().unwrap(), p["b"].as_i64().unwrap());
        assert_eq!(p["solution"].as_i64().unwrap(), a + b);
    }

    let (_, body) = common::post_json(&app, "/generate", json!({"op": "frac", "count": 2})).await;
    for p in body["problems"].as_array().unwrap() {
        assert_ne!(p["questionText"], "Can you add these?");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_on_one_session() {
    const ROUNDS: usize = 24;
    let app = common::create_test_app();
    let busy = start_session(&app, "add").await;
    let quiet = start_session(&app, "add").await;

    let (_, first) = common::post_json(&app, "/session/next", json!({"sessionId": busy})).await;

    let busy_rounds = (0..ROUNDS).map(|_| {
        let app = app.clone();
        let busy = busy.clone();
        async move {
            let (status, next) =
                common::post_json(&app, "/session/next", json!({"sessionId": busy})).await;
            assert_eq!(status, StatusCode::OK);
            let problem = next["problem"].clone();
            let body = json!({"sessionId": busy, "userAnswer": answer_for(&problem)});
            let (status, graded) = common::post_json(&app, "/session/grade", body).await;
            assert_eq!(status, StatusCode::OK);
            (problem, graded)
        }
    });
    let quiet_rounds = async {
        let mut state = Value::Null;
        for _ in 0..2 {
            let (_, next) =
                common::post_json(&app, "/session/next", json!({"sessionId": quiet})).await;
            let body = json!({"sessionId": quiet, "userAnswer": answer_for(&next["problem"])});
            let (_, graded) = common::post_json(&app, "/session/grade", body).await;
            assert_eq!(graded["correct"], true);
            state = graded["state"].clone();
        }
        state
    };
    let (results, quiet_state) = tokio::join!(join_all(busy_rounds), quiet_rounds);

    let mut served_ids = HashSet::new();
    let mut served_solutions = vec![first["problem"]["solution"].clone()];
    assert!(served_ids.insert(first["problem"]["id"].to_string()));
    for (problem, graded) in &results {
        assert!(served_ids.insert(problem["id"].to_string()), "problem served twice");
        served_solutions.push(problem["solution"].clone());
    }
    for (problem, graded) in &results {
        assert!(served_solutions.contains(&graded["expected"]));
        if graded["correct"] == true {
            assert_eq!(graded["expected"], problem["solution"]);
        }
    }

    let (_, last) = common::post_json(&app, "/session/next", json!({"sessionId": busy})).await;
    let state = &last["state"];
    let graded = state["correct"].as_u64().unwrap() + state["wrong"].as_u64().unwrap();
    assert_eq!(graded, ROUNDS as u64);

    assert_eq!(
        quiet_state,
        json!({"op": "add", "level": 1, "streak": 2, "correct": 2, "wrong": 0})
    );
}
