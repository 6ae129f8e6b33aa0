use super::*;
use crate::db;
use crate::models::{CollectionConf, DayCount, Grade, ReviewType};

/// Opens a store on a fresh database with migrations applied
///
/// Plain ":memory:" gives each connection its own separate database, so a
/// unique URI with cache=shared is used instead: every connection of the pool
/// sees the same in-memory database, isolated from other tests.
pub fn setup_test_store() -> SqliteStore {
    let unique_id = uuid::Uuid::new_v4();
    let database_url = format!("file:test_{}?mode=memory&cache=shared", unique_id);
    let pool = db::init_pool(&database_url).expect("Failed to create pool");
    SqliteStore::open(&pool).expect("Failed to open store")
}

fn review_entry(id: i64, cid: CardId) -> ReviewLogEntry {
    ReviewLogEntry {
        id,
        cid,
        usn: -1,
        ease: Grade::Good,
        ivl: 3,
        last_ivl: 1,
        factor: 2500,
        time: 4_000,
        review_type: ReviewType::Review,
    }
}

#[test]
fn test_collection_round_trip() {
    let mut store = setup_test_store();
    assert!(store.load_collection().unwrap().is_none());

    let mut conf = CollectionConf::default();
    conf.cur_deck = 7;
    let record = CollectionRecord { crt: 86_400, mtime: 5, usn: 0, conf };
    store.save_collection(&record).unwrap();
    assert_eq!(store.load_collection().unwrap(), Some(record.clone()));

    // The row is replaced, never duplicated
    let mut updated = record;
    updated.mtime = 9;
    store.save_collection(&updated).unwrap();
    assert_eq!(store.load_collection().unwrap().unwrap().mtime, 9);
}

#[test]
fn test_deck_round_trip() {
    let mut store = setup_test_store();
    let mut deck = Deck::new_normal("Spanish::Verbs");
    deck.id = 1_700_000_000_000;
    deck.rev_today = DayCount { day: 2, count: 5 };
    store.save_deck(&deck).unwrap();

    let decks = store.all_decks().unwrap();
    assert_eq!(decks, vec![deck.clone()]);

    store.remove_deck(deck.id).unwrap();
    assert!(store.all_decks().unwrap().is_empty());
}

#[test]
fn test_deck_config_round_trip() {
    let mut store = setup_test_store();
    let mut conf = DeckConfig::named("Fast");
    conf.id = 2;
    conf.new.per_day = 40;
    store.save_deck_config(&conf).unwrap();

    let loaded = store.all_deck_configs().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "Fast");
    assert_eq!(loaded[0].new.per_day, 40);

    store.remove_deck_config(2).unwrap();
    assert!(store.all_deck_configs().unwrap().is_empty());
}

#[test]
fn test_note_round_trip() {
    let mut store = setup_test_store();
    let mut note = Note::new(vec!["hola".into(), "hello".into()], vec!["greeting".into()]);
    note.id = 11;
    store.save_note(&note).unwrap();

    let loaded = store.get_note(11).unwrap().unwrap();
    assert_eq!(loaded, note);
    assert!(store.get_note(12).unwrap().is_none());
    assert_eq!(store.all_notes().unwrap().len(), 1);

    store.add_card(&Card::new(100, 11, 1, 0, 1)).unwrap();
    assert!(store.notes_without_cards(&[11]).unwrap().is_empty());
    store.remove_cards(&[100]).unwrap();
    assert_eq!(store.notes_without_cards(&[11]).unwrap(), vec![11]);

    assert_eq!(store.remove_notes(&[11]).unwrap(), 1);
    assert!(store.get_notes(&[11]).unwrap().is_empty());
}

#[test]
fn test_append_review_log_retries_on_collision() {
    let mut store = setup_test_store();

    let first = store.append_review_log(&review_entry(1_000, 5)).unwrap();
    let second = store.append_review_log(&review_entry(1_000, 5)).unwrap();

    assert_eq!(first, 1_000);
    assert_eq!(second, 1_001);

    let logs = store.review_logs_for_card(5).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].ease, Grade::Good);
    assert_eq!(logs[1].id, 1_001);
}

#[test]
fn test_append_review_log_gives_up_after_second_collision() {
    let mut store = setup_test_store();
    store.append_review_log(&review_entry(1_000, 5)).unwrap();
    store.append_review_log(&review_entry(1_001, 5)).unwrap();

    assert!(store.append_review_log(&review_entry(1_000, 5)).is_err());
}

#[test]
fn test_last_review_ids() {
    let mut store = setup_test_store();
    store.append_review_log(&review_entry(100, 5)).unwrap();
    store.append_review_log(&review_entry(300, 5)).unwrap();
    store.append_review_log(&review_entry(200, 6)).unwrap();

    let latest = store.last_review_ids(&[5, 6, 7]).unwrap();

    assert_eq!(latest.get(&5), Some(&300));
    assert_eq!(latest.get(&6), Some(&200));
    assert!(!latest.contains_key(&7));
}

#[test]
fn test_graves_are_recorded_once() {
    let mut store = setup_test_store();
    store.add_grave(-1, 42, GraveKind::Card).unwrap();
    store.add_grave(-1, 42, GraveKind::Card).unwrap();
    store.add_grave(-1, 42, GraveKind::Note).unwrap();

    assert_eq!(col_repo::count_graves(&mut store.conn, GraveKind::Card).unwrap(), 1);
    assert_eq!(col_repo::count_graves(&mut store.conn, GraveKind::Note).unwrap(), 1);
}

#[test]
fn test_rollback_discards_writes() {
    let mut store = setup_test_store();
    store.begin().unwrap();
    store.add_card(&Card::new(1, 1, 1, 0, 0)).unwrap();
    store.rollback().unwrap();
    assert!(store.get_card(1).unwrap().is_none());

    store.begin().unwrap();
    store.add_card(&Card::new(2, 1, 1, 0, 0)).unwrap();
    store.commit().unwrap();
    assert!(store.get_card(2).unwrap().is_some());
}

#[test]
fn test_max_ids() {
    let mut store = setup_test_store();
    assert_eq!(store.max_ids().unwrap(), MaxIds::default());

    store.add_card(&Card::new(50, 40, 1, 0, 0)).unwrap();
    let mut note = Note::new(vec![], vec![]);
    note.id = 40;
    store.save_note(&note).unwrap();
    store.append_review_log(&review_entry(60, 50)).unwrap();

    let ids = store.max_ids().unwrap();
    assert_eq!(ids.card, 50);
    assert_eq!(ids.note, 40);
    assert_eq!(ids.revlog, 60);
}
