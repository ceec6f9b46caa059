//! HTTP surface tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`,
//! the way the protocol bridge drives the real server.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use engram_e2e_tests::harness::TestSystem;
use engram_e2e_tests::mocks::GeneratorScript;
use engram_server::api::{router, AppState};

fn app(system: &TestSystem) -> Router {
    router(AppState {
        journal: system.journal.clone(),
        engine: system.engine.clone(),
        store: system.store.clone(),
        config: system.config.clone(),
    })
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn capture_then_poll_then_search() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let app_for = || app(&system);

    // POST /journal returns the provisional record immediately
    let (status, body) = send(
        app_for(),
        "POST",
        "/api/v1/journal",
        Some(json!({ "content": "hello world", "metadata": { "session_id": "s1" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let memory_id = body["memory"]["id"].as_str().expect("memory id").to_string();
    assert_eq!(body["memory"]["kind"], "episodic");

    // Poll GET /journal until the background pipeline has stored it
    TestSystem::wait_until(|| {
        let app = app_for();
        async move {
            let (_, body) = send(app, "GET", "/api/v1/journal?limit=10", None).await;
            body["count"].as_u64().unwrap_or(0) >= 1
        }
    })
    .await;

    let (status, body) = send(app_for(), "GET", "/api/v1/journal?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = &body["memories"][0];
    assert_eq!(listed["id"], memory_id.as_str());
    assert_eq!(listed["kind"], "episodic");
    assert_eq!(listed["accessCount"], 0);

    // Search places it first with similarity above 0.5
    let (status, body) = send(
        app_for(),
        "POST",
        "/api/v1/journal/search",
        Some(json!({ "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memories"][0]["id"], memory_id.as_str());
    assert!(body["memories"][0]["score"]["relevanceScore"].as_f64().unwrap() > 0.5);

    system.shutdown().await;
}

#[tokio::test]
async fn empty_content_is_a_400() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;

    let (status, body) = send(
        app(&system),
        "POST",
        "/api/v1/journal",
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "validation");

    system.shutdown().await;
}

#[tokio::test]
async fn unknown_memory_id_is_a_404() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;

    let (status, body) = send(app(&system), "GET", "/api/v1/journal/no-such-id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "not_found");

    system.shutdown().await;
}

#[tokio::test]
async fn get_memory_records_the_access() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    let captured = system.capture("accessed over http", None);
    system.wait_for_episodic(1).await;

    let uri = format!("/api/v1/journal/{}", captured.id);
    let (status, body) = send(app(&system), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memory"]["accessCount"], 1);

    let (_, body) = send(app(&system), "GET", &uri, None).await;
    assert_eq!(body["memory"]["accessCount"], 2);

    system.shutdown().await;
}

#[tokio::test]
async fn stats_report_per_kind_counts_and_total() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    system.capture_all(&["one", "two"], None).await;

    let (status, body) = send(app(&system), "GET", "/api/v1/journal/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["episodic"], 2);
    let total = body["total"].as_u64().unwrap();
    let sum = ["episodic", "semantic", "procedural", "metacognitive"]
        .iter()
        .map(|kind| body[*kind].as_u64().unwrap())
        .sum::<u64>();
    assert_eq!(total, sum);

    system.shutdown().await;
}

#[tokio::test]
async fn consolidate_returns_200_even_when_the_model_times_out() {
    let system = TestSystem::start(GeneratorScript::Timeout, |_| {}).await;
    system
        .capture_all(
            &["related entry one", "related entry two", "related entry three"],
            Some("timeout-session"),
        )
        .await;

    let (status, body) = send(
        app(&system),
        "POST",
        "/api/v1/journal/consolidate",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memoriesCreated"], 0);
    assert!(body["failures"].as_array().map(|f| !f.is_empty()).unwrap_or(false));

    system.shutdown().await;
}

#[tokio::test]
async fn search_defaults_apply_when_limit_is_zero() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;
    system.capture_all(&["default limit probe"], None).await;

    let (status, body) = send(
        app(&system),
        "POST",
        "/api/v1/journal/search",
        Some(json!({ "content": "probe", "limit": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    system.shutdown().await;
}

#[tokio::test]
async fn health_and_ready_respond() {
    let system = TestSystem::start(GeneratorScript::Succeed, |_| {}).await;

    let (status, body) = send(app(&system), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(app(&system), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    system.shutdown().await;
}
