use crate::clock::ManualClock;
use crate::collection::{Collection, CollectionOptions};
use crate::config::SchedulerConfig;
use crate::db;
use crate::models::{CardId, DeckId, Grade, Note};
use crate::repo::{GraveKind, SqliteStore};
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_types::Text;
use proptest::prelude::*;
use std::sync::Arc;

/// 2024-01-01 10:00:00 UTC; collections opened at this time have `crt` at
/// midnight of the same day
pub const TEST_START_SECS: i64 = 1_704_103_200;

/// Sets up a test database with migrations applied
///
/// Each call gets its own shared in-memory database. Plain ":memory:" would
/// give each pooled connection a separate database, so the URI names a
/// unique database with `cache=shared` instead.
///
/// ### Returns
///
/// An Arc-wrapped database connection pool connected to the in-memory database
pub fn setup_test_db() -> Arc<db::DbPool> {
    let unique_id = uuid::Uuid::new_v4();
    let database_url = format!("file:test_{}?mode=memory&cache=shared", unique_id);
    let pool = db::init_pool(&database_url).expect("Failed to create pool");

    let mut conn = pool.get().expect("Failed to get connection");
    db::run_migrations(&mut conn).expect("Failed to run migrations");

    Arc::new(pool)
}

/// A collection over a fresh in-memory database, driven by a manual clock
pub struct TestCollection {
    pub col: Collection<SqliteStore>,
    pub clock: ManualClock,
    /// Keeps the shared in-memory database alive
    pub pool: Arc<db::DbPool>,
}

/// Opens a new collection at [`TEST_START_SECS`] with a fixed rng seed
pub fn test_collection() -> TestCollection {
    test_collection_with(SchedulerConfig::default())
}

pub fn test_collection_with(scheduler: SchedulerConfig) -> TestCollection {
    let pool = setup_test_db();
    let clock = ManualClock::at_secs(TEST_START_SECS);
    let store = SqliteStore::open(&pool).expect("Failed to open store");
    let options = CollectionOptions { clock: Box::new(clock.clone()), rng_seed: Some(42), scheduler };
    let col = Collection::open(store, options).expect("Failed to open collection");
    TestCollection { col, clock, pool }
}

/// Adds a one-field note to a deck and returns its cards
pub fn add_note(col: &mut Collection<SqliteStore>, deck_id: DeckId, front: &str, ordinals: &[u32]) -> Vec<CardId> {
    let mut note = Note::new(vec![front.to_string(), format!("{} back", front)], Vec::new());
    col.add_note(&mut note, deck_id, ordinals).expect("Failed to add note")
}

/// Adds a note with a single card and returns the card id
pub fn add_card(col: &mut Collection<SqliteStore>, deck_id: DeckId, front: &str) -> CardId {
    add_note(col, deck_id, front, &[0])[0]
}

/// Number of graves of one kind recorded in a test collection's database
pub fn grave_count(test: &TestCollection, kind: GraveKind) -> i64 {
    use crate::schema::graves;
    use diesel::prelude::*;

    let mut conn = test.pool.get().expect("Failed to get connection");
    graves::table
        .filter(graves::kind.eq(kind.code()))
        .count()
        .get_result(&mut conn)
        .expect("Failed to count graves")
}

#[derive(QueryableByName, Debug)]
struct TableName {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Tests the setup_test_db function
///
/// This test verifies that:
/// 1. The test database can be created and connected to
/// 2. The database has the expected tables
/// 3. A collection can be opened on it
#[test]
fn test_setup_test_db() {
    let pool = setup_test_db();
    let mut conn = pool.get().unwrap();

    let table_names: Vec<TableName> = diesel::sql_query("SELECT name FROM sqlite_master WHERE type='table'")
        .load(&mut conn)
        .expect("Failed to load table names");

    let expected_tables = vec![
        "col", "cards", "notes", "revlog", "decks", "deck_config", "graves",
        "__diesel_schema_migrations",
    ];
    for table in expected_tables {
        let exists = table_names.iter().any(|t| t.name == table);
        assert!(exists, "Table '{}' not found in database", table);

        let query = format!("SELECT COUNT(*) FROM {}", table);
        let result = diesel::sql_query(&query).execute(&mut conn);
        assert!(result.is_ok(), "Failed to query table '{}': {:?}", table, result.err());
    }
    drop(conn);

    let test = test_collection();
    assert_eq!(test.col.today(), 0);
    assert_eq!(test.col.crt(), TEST_START_SECS - 10 * 3600);
}

/// Generates any of the four answer grades
pub fn arb_grade() -> impl Strategy<Value = Grade> {
    prop_oneof![
        Just(Grade::Again),
        Just(Grade::Hard),
        Just(Grade::Good),
        Just(Grade::Easy),
    ]
}

/// Generates an ease factor between the minimum and a generous maximum
pub fn arb_factor() -> impl Strategy<Value = i32> {
    1300i32..=5000
}

/// Generates a review interval in days
pub fn arb_ivl() -> impl Strategy<Value = u32> {
    1u32..=3650
}

/// Generates deck names with messy separators and whitespace, e.g. `" a :: ::b "`
pub fn arb_messy_deck_name() -> impl Strategy<Value = String> {
    prop::collection::vec("[ a-zA-Z0-9]{0,6}", 1..4).prop_map(|parts| parts.join("::"))
}

/// Generates strings with whitespace, quotes, separators and non-ASCII text
pub fn arb_messy_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_./:-]{0,20}",
        "[ \t\"'\\\\]{0,4}[a-zA-Z]{1,8}[ \t\"'\\\\]{0,4}",
        "\\PC{0,12}",
    ]
}
