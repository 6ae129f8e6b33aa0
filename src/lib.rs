/// Engram: an Anki-style spaced repetition scheduler
///
/// This library provides a collection of notes and cards stored in SQLite,
/// the study scheduler that decides which card to show next and how to
/// reschedule it, filtered decks, a small search language, and a web API.
///
/// ### Modules
///
/// - `collection`: The collection that ties storage, decks and scheduling together
/// - `sched`: Study queues, answering and rescheduling
/// - `decks`: The deck tree and deck configs
/// - `search`: Search strings over cards
/// - `repo`: Storage trait and its SQLite implementation
/// - `models`: Cards, notes, decks and review log entries
///
/// ### Web API
///
/// The library exposes a RESTful API using Axum with the following endpoints:
///
/// - `GET /decks`: Deck tree with due counts
/// - `POST /decks`: Create a deck
/// - `POST /decks/{id}/select`: Select the deck to study
/// - `POST /decks/{id}/rename`: Rename a deck
/// - `DELETE /decks/{id}`: Remove a deck
/// - `POST /filtered_decks`: Create and build a filtered deck
/// - `POST /filtered_decks/{id}/rebuild`: Rebuild a filtered deck
/// - `POST /filtered_decks/{id}/empty`: Empty a filtered deck
/// - `POST /notes`: Add a note and its cards
/// - `GET /cards/{id}`: Get a card
/// - `POST /cards/suspend`, `/cards/unsuspend`, `/cards/bury`, `/cards/reset`: Bulk card operations
/// - `GET /study/next`: The next card to study
/// - `POST /study/answer`: Answer the card in hand
/// - `GET /study/counts`: Remaining counts

pub mod clock;

pub mod collection;

/// Application configuration
pub mod config;

/// Database connection module
pub mod db;

pub mod decks;

/// Data transfer objects for the web API
pub mod dto;

pub mod errors;

/// Web API handlers
pub mod handlers;

pub mod hooks;

/// Data models module
pub mod models;

/// Repository module for database operations
pub mod repo;

pub mod sched;

/// Database schema module
pub mod schema;

pub mod search;

#[cfg(test)]
pub mod test_utils;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use collection::Collection;
use handlers::*;
use models::Card;
use repo::SqliteStore;

/// A collection being studied through the web API
///
/// The scheduler hands out one card at a time; the card stays here between
/// `/study/next` and `/study/answer`.
pub struct StudySession {
    pub col: Collection<SqliteStore>,
    /// The card shown to the user and not yet answered
    pub current: Option<Card>,
}

impl StudySession {
    pub fn new(col: Collection<SqliteStore>) -> Self {
        Self { col, current: None }
    }

    /// Forgets the card in hand
    ///
    /// Called before any change that could move or reschedule the card
    /// behind the scheduler's back.
    pub fn discard_current(&mut self) {
        self.current = None;
    }
}

/// The study session shared by all handlers
///
/// One lock serialises every request, so the collection only ever has a
/// single writer.
pub type SharedSession = Arc<Mutex<StudySession>>;

/// Creates the application router with all routes
///
/// This function sets up the Axum router with all the API endpoints.
///
/// ### Arguments
///
/// * `session` - The study session to be shared with all handlers
///
/// ### Returns
///
/// An Axum Router configured with all routes and the session as state
pub fn create_app(session: SharedSession) -> Router {
    Router::new()
        // Routes for the deck tree
        .route("/decks", get(list_decks_handler).post(create_deck_handler))
        .route("/decks/{id}", delete(remove_deck_handler))
        .route("/decks/{id}/select", post(select_deck_handler))
        .route("/decks/{id}/rename", post(rename_deck_handler))
        // Routes for filtered decks
        .route("/filtered_decks", post(create_filtered_deck_handler))
        .route("/filtered_decks/{id}/rebuild", post(rebuild_filtered_deck_handler))
        .route("/filtered_decks/{id}/empty", post(empty_filtered_deck_handler))
        // Route for adding notes
        .route("/notes", post(create_note_handler))
        // Routes for cards
        .route("/cards/{id}", get(get_card_handler))
        .route("/cards/suspend", post(suspend_cards_handler))
        .route("/cards/unsuspend", post(unsuspend_cards_handler))
        .route("/cards/bury", post(bury_cards_handler))
        .route("/cards/reset", post(reset_cards_handler))
        // Routes for studying
        .route("/study/next", get(next_card_handler))
        .route("/study/answer", post(answer_card_handler))
        .route("/study/counts", get(study_counts_handler))
        .layer(CorsLayer::permissive())
        // Add the study session to the application state
        .with_state(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::test_utils::{TestCollection, test_collection};

    /// Wraps a test collection in a shared session
    ///
    /// The returned [`TestCollection`] parts keep the clock handle and the
    /// in-memory database alive.
    fn setup_session() -> (SharedSession, crate::clock::ManualClock, Arc<crate::db::DbPool>) {
        let TestCollection { col, clock, pool } = test_collection();
        (Arc::new(Mutex::new(StudySession::new(col))), clock, pool)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    /// Tests creating decks and reading the deck tree
    ///
    /// This test verifies that:
    /// 1. POST /decks creates the deck and its missing parents
    /// 2. Creating the same deck again returns the same id
    /// 3. GET /decks nests the child under its parent
    #[tokio::test]
    async fn test_create_and_list_decks() {
        let (session, _clock, _pool) = setup_session();
        let app = create_app(session);

        let (status, deck) = send(&app, "POST", "/decks", Some(json!({ "name": "Lang::Spanish" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deck["name"], "Lang::Spanish");
        assert_eq!(deck["filtered"], false);

        let (_, again) = send(&app, "POST", "/decks", Some(json!({ "name": "lang::spanish" }))).await;
        assert_eq!(again["id"], deck["id"]);

        let (status, tree) = send(&app, "GET", "/decks", None).await;
        assert_eq!(status, StatusCode::OK);
        let lang = tree
            .as_array()
            .unwrap()
            .iter()
            .find(|node| node["name"] == "Lang")
            .expect("Lang deck in tree");
        assert_eq!(lang["children"][0]["name"], "Spanish");
    }

    /// Tests the study loop over HTTP
    ///
    /// This test verifies that:
    /// 1. A new note's card is offered by GET /study/next with intervals for all grades
    /// 2. Asking again returns the same card
    /// 3. Answering Good moves it into learning
    #[tokio::test]
    async fn test_study_next_and_answer() {
        let (session, _clock, _pool) = setup_session();
        let app = create_app(session);

        let (status, note) = send(
            &app,
            "POST",
            "/notes",
            Some(json!({ "deck_id": 1, "fields": ["hola", "hello"], "tags": ["spanish"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let card_id = note["card_ids"][0].as_i64().unwrap();

        let (status, next) = send(&app, "GET", "/study/next", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(next["card"]["id"], card_id);
        assert_eq!(next["counts"]["new"], 1);
        assert_eq!(next["buttons"], 3);
        assert_eq!(next["intervals"], json!([60, 60, 600, 4 * 86_400]));

        let (_, same) = send(&app, "GET", "/study/next", None).await;
        assert_eq!(same["card"]["id"], card_id);

        let (status, answered) =
            send(&app, "POST", "/study/answer", Some(json!({ "card_id": card_id, "grade": 3 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answered["card"]["queue"], 1);
        assert_eq!(answered["card"]["left"], 1001);
        assert_eq!(answered["counts"]["new"], 0);
    }

    /// Tests answering without a card in hand and with a bad grade
    #[tokio::test]
    async fn test_answer_errors() {
        let (session, _clock, _pool) = setup_session();
        let app = create_app(session);

        let (status, body) = send(&app, "POST", "/study/answer", Some(json!({ "card_id": 1, "grade": 3 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        send(&app, "POST", "/notes", Some(json!({ "deck_id": 1, "fields": ["a"] }))).await;
        let (_, next) = send(&app, "GET", "/study/next", None).await;
        let card_id = next["card"]["id"].as_i64().unwrap();

        let (status, _) = send(&app, "POST", "/study/answer", Some(json!({ "card_id": card_id, "grade": 7 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // The card is still in hand after the rejected grade
        let (status, _) = send(&app, "POST", "/study/answer", Some(json!({ "card_id": card_id, "grade": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Tests the bulk card endpoints and GET /cards/{id}
    #[tokio::test]
    async fn test_bulk_card_operations() {
        let (session, _clock, _pool) = setup_session();
        let app = create_app(session);

        let (_, note) = send(&app, "POST", "/notes", Some(json!({ "deck_id": 1, "fields": ["a", "b"], "ordinals": [0, 1] }))).await;
        let ids = note["card_ids"].clone();
        assert_eq!(ids.as_array().unwrap().len(), 2);

        let (status, affected) = send(&app, "POST", "/cards/suspend", Some(json!({ "card_ids": ids }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(affected["count"], 2);

        let (_, counts) = send(&app, "GET", "/study/counts", None).await;
        assert_eq!(counts["new"], 0);

        let first = ids[0].as_i64().unwrap();
        let (_, card) = send(&app, "GET", &format!("/cards/{}", first), None).await;
        assert_eq!(card["queue"], -1);

        send(&app, "POST", "/cards/unsuspend", Some(json!({ "card_ids": ids }))).await;
        let (_, counts) = send(&app, "GET", "/study/counts", None).await;
        assert_eq!(counts["new"], 2);

        let (status, _) = send(&app, "GET", "/cards/999999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Tests filtered deck creation, rebuilding and emptying
    #[tokio::test]
    async fn test_filtered_deck_endpoints() {
        let (session, _clock, _pool) = setup_session();
        let app = create_app(session);

        for front in ["uno", "dos", "tres"] {
            send(&app, "POST", "/notes", Some(json!({ "deck_id": 1, "fields": [front] }))).await;
        }

        let (status, built) = send(
            &app,
            "POST",
            "/filtered_decks",
            Some(json!({ "name": "Cram", "search": "deck:Default", "limit": 2, "order": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(built["card_count"], 2);
        let deck_id = built["deck_id"].as_i64().unwrap();

        let (_, emptied) = send(&app, "POST", &format!("/filtered_decks/{}/empty", deck_id), None).await;
        assert_eq!(emptied["card_count"], 2);

        let (_, rebuilt) = send(&app, "POST", &format!("/filtered_decks/{}/rebuild", deck_id), None).await;
        assert_eq!(rebuilt["card_count"], 2);

        // A normal deck cannot be rebuilt
        let (status, _) = send(&app, "POST", "/filtered_decks/1/rebuild", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Tests selecting, renaming and removing decks
    #[tokio::test]
    async fn test_deck_management() {
        let (session, _clock, _pool) = setup_session();
        let app = create_app(session.clone());

        let (_, a) = send(&app, "POST", "/decks", Some(json!({ "name": "A" }))).await;
        let (_, b) = send(&app, "POST", "/decks", Some(json!({ "name": "B" }))).await;
        let a_id = a["id"].as_i64().unwrap();

        let (status, _) = send(&app, "POST", &format!("/decks/{}/rename", a_id), Some(json!({ "name": "B" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, renamed) =
            send(&app, "POST", &format!("/decks/{}/rename", a_id), Some(json!({ "name": "Alpha" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Alpha");

        send(&app, "POST", "/notes", Some(json!({ "deck_id": a_id, "fields": ["x"] }))).await;
        let (status, counts) = send(&app, "POST", &format!("/decks/{}/select", a_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(counts["new"], 1);
        assert_eq!(session.lock().await.col.current_deck_id(), a_id);

        let (status, _) = send(&app, "DELETE", &format!("/decks/{}?cards_too=true", a_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, counts) = send(&app, "GET", "/study/counts", None).await;
        assert_eq!(counts["new"], 0);

        let (status, _) = send(&app, "DELETE", &format!("/decks/{}", a_id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", "/decks/1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "POST", &format!("/decks/{}/select", b["id"]), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
