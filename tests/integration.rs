/// Integration tests for the engram web API
///
/// These tests drive the whole stack through HTTP requests: JSON decoding,
/// the shared study session, the scheduler and the SQLite store. Each test
/// creates a fresh application over its own in-memory database, and moves
/// the collection's clock forward to simulate later study days.

mod common;

use axum::http::StatusCode;
use common::{DAY_SECS, add_note, create_deck, create_test_app, send, study_one};
use serde_json::json;

/// Tests a card's path from new to review over several days
///
/// This test verifies that:
/// 1. Easy on a new card graduates it straight to review
/// 2. Nothing is left to study afterwards that day
/// 3. Once the interval has passed the card is offered as a review
/// 4. Good on the review lengthens the interval
#[tokio::test]
async fn test_new_card_becomes_review() {
    let test = create_test_app();
    let app = &test.app;
    let card_id = add_note(app, 1, "gato", &[0]).await[0];

    let card = study_one(app, 4).await.expect("new card offered");
    assert_eq!(card["id"], card_id);
    assert_eq!(card["queue"], 2);
    let first_ivl = card["ivl"].as_i64().unwrap();
    assert!((3..=5).contains(&first_ivl), "graduating interval {}", first_ivl);

    let (_, next) = send(app, "GET", "/study/next", None).await;
    assert!(next["card"].is_null());
    assert_eq!(next["counts"], json!({ "new": 0, "learning": 0, "review": 0 }));

    test.clock.advance_secs(5 * DAY_SECS);
    let (_, counts) = send(app, "GET", "/study/counts", None).await;
    assert_eq!(counts["review"], 1);

    let (_, next) = send(app, "GET", "/study/next", None).await;
    assert_eq!(next["buttons"], 4);
    let intervals = next["intervals"].as_array().unwrap();
    assert_eq!(intervals.len(), 4);
    // Again relearns in minutes, the rest are whole days in increasing order
    assert_eq!(intervals[0], 600);
    assert!(intervals[1].as_i64() < intervals[2].as_i64());
    assert!(intervals[2].as_i64() < intervals[3].as_i64());

    let (status, answered) =
        send(app, "POST", "/study/answer", Some(json!({ "card_id": card_id, "grade": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["card"]["queue"], 2);
    assert!(answered["card"]["ivl"].as_i64().unwrap() > first_ivl);
    assert_eq!(answered["card"]["reps"], 2);
}

/// Tests the learning steps of a new card
///
/// This test verifies that:
/// 1. Good on a new card moves it to the second step
/// 2. The card comes back once its step delay has passed
/// 3. Good on the last step graduates it with the one-day interval
#[tokio::test]
async fn test_learning_steps() {
    let test = create_test_app();
    let app = &test.app;
    add_note(app, 1, "perro", &[0]).await;

    let card = study_one(app, 3).await.unwrap();
    assert_eq!(card["queue"], 1);
    assert_eq!(card["left"], 1001);

    // The ten minute step, plus the most jitter it can get
    test.clock.advance_secs(13 * 60);
    let card = study_one(app, 3).await.unwrap();
    assert_eq!(card["queue"], 2);
    assert_eq!(card["ivl"], 1);
    assert!(study_one(app, 3).await.is_none());
}

/// Tests that answering a card buries its new siblings
#[tokio::test]
async fn test_answer_buries_siblings() {
    let test = create_test_app();
    let app = &test.app;
    let ids = add_note(app, 1, "casa", &[0, 1]).await;

    let answered = study_one(app, 4).await.unwrap();
    let sibling = if answered["id"] == ids[0] { ids[1] } else { ids[0] };
    let (_, card) = send(app, "GET", &format!("/cards/{}", sibling), None).await;
    assert_eq!(card["queue"], -2);
    assert!(study_one(app, 4).await.is_none());

    // A new day brings the sibling back
    test.clock.advance_secs(DAY_SECS);
    let (_, card) = send(app, "GET", "/study/next", None).await;
    assert_eq!(card["card"]["id"], sibling);
}

/// Tests studying a selected deck and its children
#[tokio::test]
async fn test_select_deck_limits_study() {
    let test = create_test_app();
    let app = &test.app;
    let spanish = create_deck(app, "Languages::Spanish").await;
    let languages = create_deck(app, "Languages").await;
    let other = create_deck(app, "Other").await;
    let spanish_card = add_note(app, spanish, "uno", &[0]).await[0];
    add_note(app, other, "elsewhere", &[0]).await;

    let (status, counts) = send(app, "POST", &format!("/decks/{}/select", languages), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["new"], 1);

    let card = study_one(app, 4).await.unwrap();
    assert_eq!(card["id"], spanish_card);
    assert!(study_one(app, 4).await.is_none());

    let (_, tree) = send(app, "GET", "/decks", None).await;
    let names: Vec<&str> = tree.as_array().unwrap().iter().map(|n| n["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"Languages"));
    assert!(names.contains(&"Other"));
}

/// Tests filtered decks end to end
///
/// This test verifies that:
/// 1. Creating a filtered deck moves matching cards into it
/// 2. Moved cards remember their home deck
/// 3. Graduating a card in the filtered deck sends it home
/// 4. Emptying the deck returns the rest
#[tokio::test]
async fn test_filtered_deck_study() {
    let test = create_test_app();
    let app = &test.app;
    let spanish = create_deck(app, "Spanish").await;
    let first = add_note(app, spanish, "rojo", &[0]).await[0];
    let second = add_note(app, spanish, "azul", &[0]).await[0];
    add_note(app, 1, "unrelated", &[0]).await;

    let (status, built) = send(
        app,
        "POST",
        "/filtered_decks",
        Some(json!({ "name": "Spanish cram", "search": "deck:Spanish", "order": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(built["card_count"], 2);
    let cram = built["deck_id"].as_i64().unwrap();

    let (_, card) = send(app, "GET", &format!("/cards/{}", first), None).await;
    assert_eq!(card["did"], cram);
    assert_eq!(card["odid"], spanish);

    // The new filtered deck is selected, so studying draws from it
    let answered = study_one(app, 4).await.unwrap();
    assert_eq!(answered["did"], spanish);
    assert_eq!(answered["odid"], 0);

    let (_, emptied) = send(app, "POST", &format!("/filtered_decks/{}/empty", cram), None).await;
    assert_eq!(emptied["card_count"], 1);
    let remaining = if answered["id"] == first { second } else { first };
    let (_, card) = send(app, "GET", &format!("/cards/{}", remaining), None).await;
    assert_eq!(card["did"], spanish);
}

/// Tests that an unparsable filter search builds an empty deck
#[tokio::test]
async fn test_filtered_deck_with_bad_search() {
    let test = create_test_app();
    let app = &test.app;
    add_note(app, 1, "a", &[0]).await;

    let (status, built) =
        send(app, "POST", "/filtered_decks", Some(json!({ "name": "Broken", "search": "(unclosed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(built["card_count"], 0);
}

/// Tests forgetting a reviewed card
#[tokio::test]
async fn test_reset_card() {
    let test = create_test_app();
    let app = &test.app;
    let card_id = add_note(app, 1, "sol", &[0]).await[0];
    study_one(app, 4).await.unwrap();

    let (status, affected) = send(app, "POST", "/cards/reset", Some(json!({ "card_ids": [card_id] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(affected["count"], 1);

    let (_, card) = send(app, "GET", &format!("/cards/{}", card_id), None).await;
    assert_eq!(card["queue"], 0);
    assert_eq!(card["type"], 0);
    assert_eq!(card["ivl"], 0);
}

/// Tests the error responses of the API
#[tokio::test]
async fn test_error_responses() {
    let test = create_test_app();
    let app = &test.app;

    let (status, body) =
        send(app, "POST", "/notes", Some(json!({ "deck_id": 999, "fields": ["lost"] }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("999"));

    let (status, _) = send(app, "POST", "/notes", Some(json!({ "deck_id": 1, "fields": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app, "POST", "/decks", Some(json!({ "name": "::" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app, "POST", "/decks/424242/select", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, "POST", "/filtered_decks/424242/empty", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
