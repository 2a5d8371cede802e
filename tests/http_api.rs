//! HTTP surface exercised through the router without binding a socket.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use codelab_backend::routes::build_router;
use codelab_backend::seeds::SEED_EXPERIMENT_ID;
use codelab_backend::state::AppState;

fn app() -> Router {
    build_router(Arc::new(AppState::default()))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn progress_uri(learner: &str, experiment: &str) -> String {
    format!("/api/v1/learners/{learner}/progress/{experiment}")
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = call(&app(), Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn first_read_creates_default_and_second_read_matches() {
    let app = app();
    let uri = progress_uri("alice", SEED_EXPERIMENT_ID);

    let (status, first) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["progress"]["completedSteps"], json!([]));
    assert_eq!(first["progress"]["lastAccessedStep"], 1);
    assert_eq!(first["progress"]["isCompleted"], false);
    assert_eq!(first["gate"], json!(["unlocked", "locked", "locked"]));

    let (_, second) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn three_step_progression_over_http() {
    let app = app();
    let uri = progress_uri("alice", SEED_EXPERIMENT_ID);

    let (_, body) = call(&app, Method::PUT, &uri, Some(json!({ "completedSteps": [1], "lastAccessedStep": 2 }))).await;
    assert_eq!(body["gate"], json!(["completed", "unlocked", "locked"]));
    assert_eq!(body["progress"]["isCompleted"], false);

    let (_, body) = call(&app, Method::PUT, &uri, Some(json!({ "completedSteps": [1, 3], "lastAccessedStep": 3 }))).await;
    assert_eq!(body["progress"]["isCompleted"], false);
    assert_eq!(body["gate"], json!(["completed", "unlocked", "completed"]));

    let (_, body) = call(&app, Method::PUT, &uri, Some(json!({ "completedSteps": [1, 3, 2], "lastAccessedStep": 3 }))).await;
    assert_eq!(body["progress"]["completedSteps"], json!([1, 2, 3]));
    assert_eq!(body["progress"]["isCompleted"], true);
}

#[tokio::test]
async fn client_completion_flag_is_not_trusted() {
    let app = app();
    let uri = progress_uri("mallory", SEED_EXPERIMENT_ID);
    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "completedSteps": [1], "lastAccessedStep": 1, "isCompleted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["isCompleted"], false);
}

#[tokio::test]
async fn save_is_last_write_wins() {
    let app = app();
    let uri = progress_uri("alice", SEED_EXPERIMENT_ID);
    call(&app, Method::PUT, &uri, Some(json!({ "completedSteps": [1, 2], "lastAccessedStep": 3 }))).await;
    call(&app, Method::PUT, &uri, Some(json!({ "completedSteps": [1], "lastAccessedStep": 2 }))).await;

    let (_, body) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(body["progress"]["completedSteps"], json!([1]));
    assert_eq!(body["progress"]["lastAccessedStep"], 2);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let app = app();

    let (status, body) = call(&app, Method::PUT, &progress_uri("alice", "missing"), Some(json!({ "completedSteps": [], "lastAccessedStep": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(&app, Method::PUT, &progress_uri("alice", SEED_EXPERIMENT_ID), Some(json!({ "completedSteps": [7], "lastAccessedStep": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, _) = call(&app, Method::GET, "/api/v1/experiments/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_lists_each_experiment() {
    let app = app();
    call(&app, Method::PUT, &progress_uri("alice", SEED_EXPERIMENT_ID), Some(json!({ "completedSteps": [1], "lastAccessedStep": 2 }))).await;

    let (status, body) = call(&app, Method::GET, "/api/v1/learners/alice/progress", None).await;
    assert_eq!(status, StatusCode::OK);
    let row = &body["progress"][SEED_EXPERIMENT_ID];
    assert_eq!(row["completedSteps"], json!([1]));
    assert_eq!(row["lastAccessedStep"], 2);
    assert_eq!(row["isCompleted"], false);
}

#[tokio::test]
async fn authoring_rejects_gaps_and_accepts_valid_drafts() {
    let app = app();
    let gap = json!({
        "title": "Gappy",
        "language": "rust",
        "steps": [
            { "stepNumber": 1, "title": "a" },
            { "stepNumber": 2, "title": "b" },
            { "stepNumber": 4, "title": "d" }
        ]
    });
    let (status, _) = call(&app, Method::POST, "/api/v1/experiments", Some(gap)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ok = json!({
        "id": "rs-hello",
        "title": "Hello",
        "language": "rust",
        "steps": [
            { "title": "Print", "solutionCode": "println!(\"hi\");" },
            { "title": "Loop", "solutionCode": "for _ in 0..2 {}" }
        ]
    });
    let (status, body) = call(&app, Method::POST, "/api/v1/experiments", Some(ok)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["totalSteps"], 2);

    let (_, body) = call(&app, Method::GET, "/api/v1/experiments/rs-hello/solution", None).await;
    assert_eq!(body["text"], "// Step 1: Print\nprintln!(\"hi\");\n\n// Step 2: Loop\nfor _ in 0..2 {}\n");

    let (_, body) = call(&app, Method::GET, "/api/v1/experiments", None).await;
    let ids: Vec<&str> = body["experiments"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert!(ids.contains(&"rs-hello"));
    assert!(ids.contains(&SEED_EXPERIMENT_ID));
}

#[tokio::test]
async fn deleted_experiment_rejects_later_saves() {
    let app = app();
    let uri = progress_uri("alice", SEED_EXPERIMENT_ID);
    call(&app, Method::GET, &uri, None).await;

    let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/experiments/{SEED_EXPERIMENT_ID}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::PUT, &uri, Some(json!({ "completedSteps": [1], "lastAccessedStep": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn save_reports_gate_for_the_saved_experiment() {
    let app = app();
    let draft = json!({
        "id": "two-step",
        "title": "Pair",
        "language": "go",
        "steps": [{ "title": "a" }, { "title": "b" }]
    });
    let (status, _) = call(&app, Method::POST, "/api/v1/experiments", Some(draft)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::PUT, &progress_uri("alice", "two-step"), Some(json!({ "completedSteps": [1], "lastAccessedStep": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["experimentId"], "two-step");
    assert_eq!(body["gate"], json!(["completed", "unlocked"]));
}
