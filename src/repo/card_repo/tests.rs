use super::*;
use crate::repo::tests::setup_test_store;
use crate::repo::Store;

fn card(id: CardId, did: i64, queue: Queue, due: i64) -> Card {
    let mut card = Card::new(id, id * 10, did, 0, due);
    card.queue = queue;
    card.ctype = match queue {
        Queue::Learning => CardType::Learning,
        Queue::Review | Queue::DayLearning => CardType::Review,
        _ => CardType::New,
    };
    card
}

#[test]
fn test_card_round_trip() {
    let mut store = setup_test_store();
    let mut original = card(1, 1, Queue::Review, 20);
    original.ivl = 12;
    original.factor = 2350;
    original.reps = 7;
    original.lapses = 1;
    original.left = 1002;
    original.odid = 3;
    original.odue = 18;
    store.add_card(&original).unwrap();

    let loaded = store.get_card(1).unwrap().unwrap();
    assert_eq!(loaded, original);
    assert!(store.get_card(2).unwrap().is_none());
}

#[test]
fn test_save_card_replaces() {
    let mut store = setup_test_store();
    let mut c = card(1, 1, Queue::New, 1);
    store.add_card(&c).unwrap();
    c.queue = Queue::Suspended;
    store.save_card(&c).unwrap();
    assert_eq!(store.get_card(1).unwrap().unwrap().queue, Queue::Suspended);
}

#[test]
fn test_count_cards_respects_limit() {
    let mut store = setup_test_store();
    for id in 1..=5 {
        store.add_card(&card(id, 1, Queue::New, id)).unwrap();
    }
    store.add_card(&card(6, 2, Queue::New, 1)).unwrap();

    let filter = CardFilter::new().deck(1).queue(Queue::New);
    assert_eq!(store.count_cards(&filter, None).unwrap(), 5);
    assert_eq!(store.count_cards(&filter, Some(3)).unwrap(), 3);
    assert_eq!(store.count_cards(&filter, Some(0)).unwrap(), 0);
}

#[test]
fn test_home_decks_and_excluded_queues() {
    let mut store = setup_test_store();
    store.add_card(&card(1, 1, Queue::New, 1)).unwrap();
    let mut borrowed = card(2, 5, Queue::Review, 0);
    borrowed.odid = 1;
    store.add_card(&borrowed).unwrap();
    store.add_card(&card(3, 1, Queue::Suspended, 1)).unwrap();
    store.add_card(&card(4, 2, Queue::New, 1)).unwrap();

    let home = CardFilter::new().home_decks(&[1]);
    assert_eq!(store.query_card_ids(&home, CardOrder::Id, None).unwrap(), vec![1, 2, 3]);

    let active = home.without_queues(&[Queue::Suspended, Queue::Buried]);
    assert_eq!(store.query_card_ids(&active, CardOrder::Id, None).unwrap(), vec![1, 2]);
}

#[test]
fn test_due_bounds() {
    let mut store = setup_test_store();
    store.add_card(&card(1, 1, Queue::Review, 4)).unwrap();
    store.add_card(&card(2, 1, Queue::Review, 5)).unwrap();
    store.add_card(&card(3, 1, Queue::Review, 6)).unwrap();

    let base = CardFilter::new().deck(1).queue(Queue::Review);
    let before = store
        .query_card_ids(&base.clone().due(DueBound::Before(5)), CardOrder::Id, None)
        .unwrap();
    let at_or_before = store
        .query_card_ids(&base.clone().due(DueBound::AtOrBefore(5)), CardOrder::Id, None)
        .unwrap();
    let at_or_after = store
        .query_card_ids(&base.due(DueBound::AtOrAfter(5)), CardOrder::Id, None)
        .unwrap();

    assert_eq!(before, vec![1]);
    assert_eq!(at_or_before, vec![1, 2]);
    assert_eq!(at_or_after, vec![2, 3]);
}

#[test]
fn test_query_orders_by_due() {
    let mut store = setup_test_store();
    store.add_card(&card(1, 1, Queue::New, 30)).unwrap();
    store.add_card(&card(2, 1, Queue::New, 10)).unwrap();
    store.add_card(&card(3, 1, Queue::New, 20)).unwrap();

    let cards = store
        .query_cards(&CardFilter::new().deck(1), CardOrder::Due, Some(2))
        .unwrap();
    let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_filter_by_note_and_exclusion() {
    let mut store = setup_test_store();
    let mut a = card(1, 1, Queue::New, 1);
    let mut b = card(2, 1, Queue::New, 2);
    let c = card(3, 1, Queue::New, 3);
    a.nid = 99;
    b.nid = 99;
    for card in [&a, &b, &c] {
        store.add_card(card).unwrap();
    }

    let siblings = store
        .query_card_ids(&CardFilter::new().note(99).excluding(1), CardOrder::Id, None)
        .unwrap();
    assert_eq!(siblings, vec![2]);
}

#[test]
fn test_filtered_deck_predicates() {
    let mut store = setup_test_store();
    let mut moved = card(1, 50, Queue::Review, -100_000);
    moved.odid = 1;
    moved.odue = 8;
    store.add_card(&moved).unwrap();
    store.add_card(&card(2, 1, Queue::Review, 8)).unwrap();

    let inside = store
        .query_card_ids(&CardFilter::new().in_filtered_deck(true), CardOrder::Id, None)
        .unwrap();
    let outside = store
        .query_card_ids(&CardFilter::new().in_filtered_deck(false), CardOrder::Id, None)
        .unwrap();
    let from_home = store
        .query_card_ids(&CardFilter::new().original_decks(&[1]), CardOrder::Id, None)
        .unwrap();

    assert_eq!(inside, vec![1]);
    assert_eq!(outside, vec![2]);
    assert_eq!(from_home, vec![1]);
}

#[test]
fn test_bulk_update_set_and_restore() {
    let mut store = setup_test_store();
    store.add_card(&card(1, 1, Queue::Review, 3)).unwrap();
    store.add_card(&card(2, 1, Queue::New, 3)).unwrap();
    store.add_card(&card(3, 1, Queue::Learning, 3)).unwrap();

    let bury = CardUpdate { queue: QueueChange::Set(Queue::Buried), usn: -1, mtime: 77 };
    let updated = store
        .bulk_update_cards(&CardFilter::new().ids(&[1, 2]), &bury)
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(store.get_card(1).unwrap().unwrap().queue, Queue::Buried);
    assert_eq!(store.get_card(1).unwrap().unwrap().mtime, 77);
    assert_eq!(store.get_card(3).unwrap().unwrap().queue, Queue::Learning);

    let restore = CardUpdate { queue: QueueChange::RestoreFromType, usn: -1, mtime: 78 };
    let restored = store
        .bulk_update_cards(&CardFilter::new().queue(Queue::Buried), &restore)
        .unwrap();
    assert_eq!(restored, 2);
    assert_eq!(store.get_card(1).unwrap().unwrap().queue, Queue::Review);
    assert_eq!(store.get_card(2).unwrap().unwrap().queue, Queue::New);
}

#[test]
fn test_bulk_update_with_no_matches() {
    let mut store = setup_test_store();
    let update = CardUpdate { queue: QueueChange::Set(Queue::Suspended), usn: 0, mtime: 0 };
    assert_eq!(store.bulk_update_cards(&CardFilter::new().ids(&[9]), &update).unwrap(), 0);
}

#[test]
fn test_max_new_position_ignores_reviews() {
    let mut store = setup_test_store();
    assert_eq!(store.max_new_position().unwrap(), 0);
    store.add_card(&card(1, 1, Queue::New, 12)).unwrap();
    store.add_card(&card(2, 1, Queue::Review, 400)).unwrap();
    assert_eq!(store.max_new_position().unwrap(), 12);
}
