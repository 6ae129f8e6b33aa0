//! Common test utilities for engram integration tests
//!
//! This file contains shared functions for the integration tests: building
//! an application over a fresh in-memory database with a controllable clock,
//! sending requests, and creating common test objects.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use engram::{
    clock::ManualClock,
    collection::{Collection, CollectionOptions},
    config::SchedulerConfig,
    create_app,
    db::{self, DbPool},
    repo::SqliteStore,
    StudySession,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

/// 2024-03-04 09:00:00 UTC
pub const START_SECS: i64 = 1_709_542_800;

pub const DAY_SECS: i64 = 86_400;

/// An application over its own database, with a handle on its clock
pub struct TestApp {
    pub app: Router,
    pub clock: ManualClock,
    /// Keeps the shared in-memory database alive
    pub pool: Arc<DbPool>,
}

/// Opens a fresh database and collection at [`START_SECS`]
///
/// Each call gets a uniquely named shared-cache in-memory database, so tests
/// are isolated from each other and need no cleanup.
pub fn open_collection() -> (Collection<SqliteStore>, ManualClock, Arc<DbPool>) {
    let url = format!("file:it_{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    let pool = Arc::new(db::init_pool(&url).expect("Failed to create pool"));
    let store = SqliteStore::open(&pool).expect("Failed to open store");
    let clock = ManualClock::at_secs(START_SECS);
    let options = CollectionOptions {
        clock: Box::new(clock.clone()),
        rng_seed: Some(7),
        scheduler: SchedulerConfig::default(),
    };
    let col = Collection::open(store, options).expect("Failed to open collection");
    (col, clock, pool)
}

/// Creates a test application with an in-memory SQLite database
///
/// ### Returns
///
/// The router together with the clock driving its collection
pub fn create_test_app() -> TestApp {
    let (col, clock, pool) = open_collection();
    let session = Arc::new(Mutex::new(StudySession::new(col)));
    TestApp { app: create_app(session), clock, pool }
}

/// Sends a request and decodes the JSON response, if any
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, value)
}

/// Creates a deck via the API and returns its id
pub async fn create_deck(app: &Router, name: &str) -> i64 {
    let (status, deck) = send(app, "POST", "/decks", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::OK, "creating deck {}: {}", name, deck);
    deck["id"].as_i64().unwrap()
}

/// Adds a note via the API and returns its card ids
pub async fn add_note(app: &Router, deck_id: i64, front: &str, ordinals: &[u32]) -> Vec<i64> {
    let body = json!({
        "deck_id": deck_id,
        "fields": [front, format!("{} back", front)],
        "ordinals": ordinals,
    });
    let (status, created) = send(app, "POST", "/notes", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "adding note {}: {}", front, created);
    created["card_ids"].as_array().unwrap().iter().map(|id| id.as_i64().unwrap()).collect()
}

/// Takes the next card and answers it
///
/// ### Returns
///
/// The answered card, or `None` if nothing was left to study
pub async fn study_one(app: &Router, grade: u8) -> Option<Value> {
    let (status, next) = send(app, "GET", "/study/next", None).await;
    assert_eq!(status, StatusCode::OK);
    if next["card"].is_null() {
        return None;
    }
    let card_id = next["card"]["id"].as_i64().unwrap();
    let (status, answered) =
        send(app, "POST", "/study/answer", Some(json!({ "card_id": card_id, "grade": grade }))).await;
    assert_eq!(status, StatusCode::OK, "answering {}: {}", card_id, answered);
    Some(answered["card"].clone())
}
