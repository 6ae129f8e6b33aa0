use super::*;
use serde_json::json;

#[test]
fn test_create_note_defaults() {
    let dto: CreateNoteDto = serde_json::from_value(json!({
        "deck_id": 1,
        "fields": ["front", "back"]
    }))
    .unwrap();
    assert_eq!(dto.deck_id, 1);
    assert!(dto.tags.is_empty());
    assert_eq!(dto.ordinals, vec![0]);
}

#[test]
fn test_create_filtered_deck_defaults() {
    let dto: CreateFilteredDeckDto = serde_json::from_value(json!({
        "name": "Cram",
        "search": "is:due"
    }))
    .unwrap();
    assert_eq!(dto.limit, 100);
    assert_eq!(dto.order, DynOrder::Oldest);
    assert!(dto.resched);
}

#[test]
fn test_create_filtered_deck_order_code() {
    let dto: CreateFilteredDeckDto = serde_json::from_value(json!({
        "name": "Cram",
        "search": "deck:Spanish",
        "limit": 20,
        "order": 7,
        "resched": false
    }))
    .unwrap();
    let options = dto.to_options();
    assert_eq!(options.terms.len(), 1);
    assert_eq!(options.terms[0].search, "deck:Spanish");
    assert_eq!(options.terms[0].limit, 20);
    assert_eq!(options.terms[0].order, DynOrder::ReverseAdded);
    assert!(!options.resched);
    // Everything else keeps the deck defaults
    assert!(options.return_cards);
    assert!(options.delays.is_none());
}

#[test]
fn test_remove_deck_query_default() {
    let query: RemoveDeckQuery = serde_json::from_value(json!({})).unwrap();
    assert!(!query.cards_too);
}

#[test]
fn test_answer_dto_rejects_negative_grade() {
    let result = serde_json::from_value::<AnswerDto>(json!({ "card_id": 5, "grade": -1 }));
    assert!(result.is_err());
}

#[test]
fn test_next_card_dto_without_card() {
    let dto = NextCardDto { card: None, counts: Counts::default(), buttons: 0, intervals: Vec::new() };
    let value = serde_json::to_value(&dto).unwrap();
    assert_eq!(value["card"], serde_json::Value::Null);
    assert_eq!(value["counts"], json!({ "new": 0, "learning": 0, "review": 0 }));
}
