//! HTTP tests for the redemption API over in-memory doubles.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::http::StatusCode;
use axum_test::TestServer;
use nexus_runtime::{EngineConfig, LockSettings, RedemptionEngine, RetryPolicy};
use nexus_testing::{InMemoryInventoryStore, InMemoryLockService, test_clock};
use nexus_web::{AppState, REQUEST_ID_HEADER, build_router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    server: TestServer,
    store: Arc<InMemoryInventoryStore>,
    locks: Arc<InMemoryLockService>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryInventoryStore::new());
    let locks = Arc::new(InMemoryLockService::new());
    let config = EngineConfig {
        lock: LockSettings {
            lease: Duration::from_secs(10),
            retry: RetryPolicy::fixed(3, Duration::from_millis(5)),
        },
        ..EngineConfig::default()
    };
    let engine = RedemptionEngine::new(Arc::clone(&store), Arc::clone(&locks), Arc::new(test_clock()), config);
    let server = TestServer::new(build_router(AppState::new(engine))).unwrap();
    Harness { server, store, locks }
}

fn seed(store: &InMemoryInventoryStore, items: usize) {
    let pool = store.seed_pool("Premium");
    store.seed_items(pool.id, items);
    store.seed_code("X1", pool.id, None);
}

fn error_code(body: &Value) -> &str {
    body["code"].as_str().unwrap()
}

#[tokio::test]
async fn test_redeem_then_replay() {
    let h = harness();
    seed(&h.store, 1);

    let first = h.server.post("/api/redeem").json(&json!({ "code": " x1 " })).await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["success"], true);
    assert_eq!(first["pool_name"], "Premium");
    assert_eq!(first["view_count"], 1);
    assert!(first["account"].is_string());
    assert!(first["first_used_at"].is_string());

    let second: Value = h.server.post("/api/redeem").json(&json!({ "code": "X1" })).await.json();
    assert_eq!(second["account"], first["account"]);
    assert_eq!(second["view_count"], 2);
    assert_eq!(second["first_used_at"], first["first_used_at"]);
}

#[tokio::test]
async fn test_error_mapping() {
    let h = harness();
    let pool = h.store.seed_pool("Empty");
    h.store.seed_code("EMPTY1", pool.id, None);

    let blank = h.server.post("/api/redeem").json(&json!({ "code": "   " })).await;
    blank.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&blank.json()), "INVALID_INPUT");

    let missing = h.server.post("/api/redeem").json(&json!({ "code": "NOPE" })).await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&missing.json()), "NOT_FOUND");

    let empty = h.server.post("/api/redeem").json(&json!({ "code": "empty1" })).await;
    empty.assert_status(StatusCode::CONFLICT);
    let body: Value = empty.json();
    assert_eq!(error_code(&body), "OUT_OF_STOCK");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let h = harness();

    let response = h.server.post("/api/redeem").json(&json!({ "token": "X1" })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json()), "INVALID_INPUT");
}

#[tokio::test]
async fn test_held_lock_is_busy() {
    let h = harness();
    seed(&h.store, 1);
    h.locks.hold("redeem:X1", Duration::from_secs(10));

    let response = h.server.post("/api/redeem").json(&json!({ "code": "X1" })).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&response.json()), "BUSY");

    h.locks.clear("redeem:X1");
    h.server.post("/api/redeem").json(&json!({ "code": "X1" })).await.assert_status_ok();
}

#[tokio::test]
async fn test_store_failure_hides_details() {
    let h = harness();
    seed(&h.store, 1);
    h.store.set_unavailable(true);

    let response = h.server.post("/api/redeem").json(&json!({ "code": "X1" })).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "STORE_ERROR");
    assert!(!body["message"].as_str().unwrap().contains("Database"));
}

#[tokio::test]
async fn test_degraded_lock_still_redeems() {
    let h = harness();
    seed(&h.store, 1);
    h.locks.set_unreachable(true);

    let response = h.server.post("/api/redeem").json(&json!({ "code": "X1" })).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["view_count"], 1);
}

#[tokio::test]
async fn test_health_and_readiness() {
    let h = harness();

    let health = h.server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = h.server.get("/ready").await;
    ready.assert_status_ok();
    let body: Value = ready.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["lock"], "enabled");

    h.store.set_unavailable(true);
    let not_ready = h.server.get("/ready").await;
    not_ready.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(not_ready.json::<Value>()["database"], false);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let h = harness();

    let response = h.server.get("/health").await;
    let id = response.header(REQUEST_ID_HEADER);
    assert!(uuid_like(id.to_str().unwrap()));
}

fn uuid_like(s: &str) -> bool {
    s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4
}
