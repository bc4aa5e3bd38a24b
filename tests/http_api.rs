//! End-to-end tests for the JSON API.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use quiz_srs::domain::ReviewState;
use quiz_srs::error::StoreResult;
use quiz_srs::handlers;
use quiz_srs::srs::Scheduler;
use quiz_srs::state::AppState;
use quiz_srs::store::{MemoryStore, StateStore};

const T0: &str = "2024-04-02T18:45:00Z";
const T0_PLUS_1D: &str = "2024-04-03T18:45:00Z";

fn server_with(store: Arc<dyn StateStore>, timeout: Duration) -> TestServer {
    let scheduler = Arc::new(Scheduler::new(store).with_timeout(timeout));
    let app = handlers::router(AppState::new(scheduler));
    TestServer::new(app).unwrap()
}

fn server() -> TestServer {
    server_with(Arc::new(MemoryStore::new()), Duration::from_secs(5))
}

#[tokio::test]
async fn test_health() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_unknown_item_has_default_state() {
    let server = server();
    let body: Value = server.get("/items/never-seen").await.json();
    assert_eq!(body["easeFactor"], 2.5);
    assert_eq!(body["interval"], 0);
    assert_eq!(body["repetitions"], 0);
    assert_eq!(body["nextReview"], Value::Null);
    assert_eq!(body["lastReview"], Value::Null);
}

#[tokio::test]
async fn test_review_then_due_cycle() {
    let server = server();

    let due: Value = server
        .post("/due")
        .json(&json!({ "items": ["q42"], "asOf": T0 }))
        .await
        .json();
    assert_eq!(due[0]["item"], "q42");

    let response = server
        .post("/reviews")
        .json(&json!({ "itemId": "q42", "quality": 5, "reviewedAt": T0 }))
        .await;
    response.assert_status_ok();
    let state: Value = response.json();
    assert_eq!(state["interval"], 1);
    assert_eq!(state["repetitions"], 1);
    assert_eq!(state["totalReviews"], 1);
    assert!((state["easeFactor"].as_f64().unwrap() - 2.6).abs() < 1e-9);

    let due: Value = server
        .post("/due")
        .json(&json!({ "items": ["q42"], "asOf": T0 }))
        .await
        .json();
    assert_eq!(due, json!([]));

    let due: Value = server
        .post("/due")
        .json(&json!({ "items": ["q42"], "asOf": T0_PLUS_1D }))
        .await
        .json();
    assert_eq!(due.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_due_keeps_request_order() {
    let server = server();
    server
        .post("/reviews")
        .json(&json!({ "itemId": "b", "quality": 4, "reviewedAt": T0 }))
        .await
        .assert_status_ok();

    let due: Value = server
        .post("/due")
        .json(&json!({ "items": ["d", "b", "a"], "asOf": T0 }))
        .await
        .json();
    let ids: Vec<&str> = due
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["item"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["d", "a"]);
}

#[tokio::test]
async fn test_review_from_correctness_and_confidence() {
    let server = server();
    let state: Value = server
        .post("/reviews")
        .json(&json!({ "itemId": "q1", "isCorrect": true, "confidence": "low", "reviewedAt": T0 }))
        .await
        .json();
    // quality 3
    assert!((state["easeFactor"].as_f64().unwrap() - 2.36).abs() < 1e-9);
    assert_eq!(state["correctStreak"], 1);
}

#[tokio::test]
async fn test_invalid_reviews_are_rejected() {
    let server = server();

    let response = server
        .post("/reviews")
        .json(&json!({ "itemId": "q1", "quality": 7 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].as_str().unwrap().contains("quality"));

    server
        .post("/reviews")
        .json(&json!({ "itemId": "", "quality": 3 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/reviews")
        .json(&json!({ "itemId": "q1" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["totalCards"], 0);
}

#[tokio::test]
async fn test_stats_and_summary() {
    let server = server();
    for (id, quality) in [("a", 5), ("b", 1), ("c", 4)] {
        server
            .post("/reviews")
            .json(&json!({ "itemId": id, "quality": quality }))
            .await
            .assert_status_ok();
    }

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["totalCards"], 3);
    assert_eq!(stats["newCards"], 1);
    assert_eq!(stats["learning"], 2);
    assert_eq!(stats["totalReviews"], 3);
    assert_eq!(stats["dueToday"], 0);

    let summary: Value = server.get("/summary").await.json();
    assert_eq!(summary["totalCards"], 3);
    assert_eq!(summary["dueCount"], 0);
    assert!(summary["nextReview"].is_string());
    assert!(summary["nextReviewRelative"].is_string());
}

#[tokio::test]
async fn test_export_import_roundtrip() {
    let source = server();
    source
        .post("/reviews")
        .json(&json!({ "itemId": "a", "quality": 5, "reviewedAt": T0 }))
        .await
        .assert_status_ok();
    source
        .post("/reviews")
        .json(&json!({ "itemId": "b", "quality": 2, "reviewedAt": T0 }))
        .await
        .assert_status_ok();
    let exported = source.get("/export").await.text();

    let target = server();
    let response = target.post("/import").text(exported.clone()).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["imported"], 2);

    let reexported: Value = target.get("/export").await.json();
    assert_eq!(reexported, serde_json::from_str::<Value>(&exported).unwrap());
    assert_eq!(reexported["a"]["nextReview"], source.get("/items/a").await.json::<Value>()["nextReview"]);
}

#[tokio::test]
async fn test_malformed_import_keeps_state() {
    let server = server();
    server
        .post("/reviews")
        .json(&json!({ "itemId": "keep", "quality": 5 }))
        .await
        .assert_status_ok();

    server
        .post("/import")
        .text("{ not json")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let state: Value = server.get("/items/keep").await.json();
    assert_eq!(state["totalReviews"], 1);
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    let server = server();
    server
        .post("/reviews")
        .json(&json!({ "itemId": "a", "quality": 5 }))
        .await
        .assert_status_ok();

    server.post("/reset").await.assert_status(StatusCode::NO_CONTENT);
    server.post("/reset").await.assert_status(StatusCode::NO_CONTENT);

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["totalCards"], 0);
    assert_eq!(stats["averageEaseFactor"], 2.5);
}

/// Store that answers every call far too late.
struct SlowStore;

impl SlowStore {
    fn stall() {
        std::thread::sleep(Duration::from_millis(500));
    }
}

impl StateStore for SlowStore {
    fn get(&self, _item_id: &str) -> StoreResult<Option<ReviewState>> {
        Self::stall();
        Ok(None)
    }
    fn set(&self, _state: &ReviewState) -> StoreResult<()> {
        Self::stall();
        Ok(())
    }
    fn remove(&self, _item_id: &str) -> StoreResult<()> {
        Self::stall();
        Ok(())
    }
    fn keys(&self) -> StoreResult<Vec<String>> {
        Self::stall();
        Ok(Vec::new())
    }
    fn snapshot(&self) -> StoreResult<Vec<ReviewState>> {
        Self::stall();
        Ok(Vec::new())
    }
    fn replace_all(&self, _states: Vec<ReviewState>) -> StoreResult<()> {
        Self::stall();
        Ok(())
    }
    fn clear(&self) -> StoreResult<()> {
        Self::stall();
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let server = server_with(Arc::new(SlowStore), Duration::from_millis(50));

    let response = server
        .post("/reviews")
        .json(&json!({ "itemId": "q1", "quality": 4 }))
        .await;
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);
    assert!(response.json::<Value>()["error"].as_str().unwrap().contains("50 ms"));

    server.get("/stats").await.assert_status(StatusCode::GATEWAY_TIMEOUT);
}

/// Memory store that accepts writes, but only after a delay.
struct SlowSet {
    inner: MemoryStore,
}

impl StateStore for SlowSet {
    fn get(&self, item_id: &str) -> StoreResult<Option<ReviewState>> {
        self.inner.get(item_id)
    }
    fn set(&self, state: &ReviewState) -> StoreResult<()> {
        std::thread::sleep(Duration::from_millis(200));
        self.inner.set(state)
    }
    fn remove(&self, item_id: &str) -> StoreResult<()> {
        self.inner.remove(item_id)
    }
    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }
    fn snapshot(&self) -> StoreResult<Vec<ReviewState>> {
        self.inner.snapshot()
    }
    fn replace_all(&self, states: Vec<ReviewState>) -> StoreResult<()> {
        self.inner.replace_all(states)
    }
    fn clear(&self) -> StoreResult<()> {
        self.inner.clear()
    }
}

#[tokio::test]
async fn test_timed_out_review_is_not_recorded() {
    let store = Arc::new(SlowSet {
        inner: MemoryStore::new(),
    });
    let server = server_with(store, Duration::from_millis(50));

    for _ in 0..2 {
        server
            .post("/reviews")
            .json(&json!({ "itemId": "q1", "quality": 5 }))
            .await
            .assert_status(StatusCode::GATEWAY_TIMEOUT);
    }

    let state: Value = server.get("/items/q1").await.json();
    assert_eq!(state["totalReviews"], 0);
    assert_eq!(state["repetitions"], 0);
    assert_eq!(state["nextReview"], Value::Null);

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["totalCards"], 0);
}
