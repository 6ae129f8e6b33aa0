/// Repository module
///
/// This module provides the data access layer. The [`Store`] trait is the
/// contract the collection and scheduler are written against; [`SqliteStore`]
/// implements it with diesel on top of the tables in `schema.rs`.
///
/// Row conversion and the individual queries live in the per-table modules;
/// the trait implementation only forwards to them.

mod card_repo;
mod col_repo;
mod deck_repo;
mod note_repo;
mod revlog_repo;

pub use col_repo::{CollectionRecord, GraveKind};

use std::collections::HashMap;

use anyhow::Result;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use tracing::{debug, instrument};

use crate::db::{DbConn, DbPool, run_migrations};
use crate::models::{
    Card, CardId, CardType, Deck, DeckConfig, DeckConfigId, DeckId, Note, NoteId, Queue,
    ReviewLogEntry,
};

/// Bound on the `due` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueBound {
    Before(i64),
    AtOrBefore(i64),
    AtOrAfter(i64),
}

/// Predicate over cards; unset fields do not restrict
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    pub ids: Option<Vec<CardId>>,
    pub deck_ids: Option<Vec<DeckId>>,
    pub note_ids: Option<Vec<NoteId>>,
    pub exclude_id: Option<CardId>,
    pub queues: Option<Vec<Queue>>,
    pub types: Option<Vec<CardType>>,
    pub due: Option<DueBound>,
    /// Restrict to cards inside (`true`) or outside (`false`) filtered decks
    pub in_filtered_deck: Option<bool>,
    pub original_deck_ids: Option<Vec<DeckId>>,
    /// Cards whose deck or original deck is one of these
    pub home_deck_ids: Option<Vec<DeckId>>,
    pub excluded_queues: Option<Vec<Queue>>,
}

impl CardFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: &[CardId]) -> Self {
        self.ids = Some(ids.to_vec());
        self
    }

    pub fn deck(mut self, deck_id: DeckId) -> Self {
        self.deck_ids = Some(vec![deck_id]);
        self
    }

    pub fn decks(mut self, deck_ids: &[DeckId]) -> Self {
        self.deck_ids = Some(deck_ids.to_vec());
        self
    }

    pub fn note(mut self, note_id: NoteId) -> Self {
        self.note_ids = Some(vec![note_id]);
        self
    }

    pub fn notes(mut self, note_ids: &[NoteId]) -> Self {
        self.note_ids = Some(note_ids.to_vec());
        self
    }

    pub fn excluding(mut self, card_id: CardId) -> Self {
        self.exclude_id = Some(card_id);
        self
    }

    pub fn queue(mut self, queue: Queue) -> Self {
        self.queues = Some(vec![queue]);
        self
    }

    pub fn queues(mut self, queues: &[Queue]) -> Self {
        self.queues = Some(queues.to_vec());
        self
    }

    pub fn card_type(mut self, card_type: CardType) -> Self {
        self.types = Some(vec![card_type]);
        self
    }

    pub fn due(mut self, bound: DueBound) -> Self {
        self.due = Some(bound);
        self
    }

    pub fn in_filtered_deck(mut self, inside: bool) -> Self {
        self.in_filtered_deck = Some(inside);
        self
    }

    pub fn original_decks(mut self, deck_ids: &[DeckId]) -> Self {
        self.original_deck_ids = Some(deck_ids.to_vec());
        self
    }

    pub fn home_decks(mut self, deck_ids: &[DeckId]) -> Self {
        self.home_deck_ids = Some(deck_ids.to_vec());
        self
    }

    pub fn without_queues(mut self, queues: &[Queue]) -> Self {
        self.excluded_queues = Some(queues.to_vec());
        self
    }
}

/// Result ordering for card queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardOrder {
    Unordered,
    /// By due, then template ordinal, then id
    Due,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueChange {
    Set(Queue),
    /// Return the card to the queue matching its type
    RestoreFromType,
}

/// Field updates applied by [`Store::bulk_update_cards`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardUpdate {
    pub queue: QueueChange,
    pub usn: i32,
    pub mtime: i64,
}

/// Largest ids currently stored, used to keep new ids increasing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxIds {
    pub card: i64,
    pub note: i64,
    pub revlog: i64,
    pub deck: i64,
    pub config: i64,
}

/// Persistence contract for a collection
///
/// Every method may fail with a storage error. Implementations are not
/// expected to be shared between threads; the collection owns its store.
pub trait Store {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    fn load_collection(&mut self) -> Result<Option<CollectionRecord>>;
    fn save_collection(&mut self, record: &CollectionRecord) -> Result<()>;
    fn add_grave(&mut self, usn: i32, oid: i64, kind: GraveKind) -> Result<()>;
    fn max_ids(&mut self) -> Result<MaxIds>;

    fn all_decks(&mut self) -> Result<Vec<Deck>>;
    fn save_deck(&mut self, deck: &Deck) -> Result<()>;
    fn remove_deck(&mut self, deck_id: DeckId) -> Result<()>;
    fn all_deck_configs(&mut self) -> Result<Vec<DeckConfig>>;
    fn save_deck_config(&mut self, conf: &DeckConfig) -> Result<()>;
    fn remove_deck_config(&mut self, config_id: DeckConfigId) -> Result<()>;

    fn get_card(&mut self, card_id: CardId) -> Result<Option<Card>>;
    fn add_card(&mut self, card: &Card) -> Result<()>;
    fn save_card(&mut self, card: &Card) -> Result<()>;
    fn remove_cards(&mut self, ids: &[CardId]) -> Result<usize>;
    /// Counts matching cards, stopping early at `limit`
    fn count_cards(&mut self, filter: &CardFilter, limit: Option<usize>) -> Result<usize>;
    fn query_cards(&mut self, filter: &CardFilter, order: CardOrder, limit: Option<usize>) -> Result<Vec<Card>>;
    fn query_card_ids(&mut self, filter: &CardFilter, order: CardOrder, limit: Option<usize>) -> Result<Vec<CardId>>;
    fn bulk_update_cards(&mut self, filter: &CardFilter, update: &CardUpdate) -> Result<usize>;
    fn max_new_position(&mut self) -> Result<i64>;

    fn get_note(&mut self, note_id: NoteId) -> Result<Option<Note>>;
    fn get_notes(&mut self, note_ids: &[NoteId]) -> Result<Vec<Note>>;
    fn all_notes(&mut self) -> Result<Vec<Note>>;
    fn save_note(&mut self, note: &Note) -> Result<()>;
    fn remove_notes(&mut self, ids: &[NoteId]) -> Result<usize>;
    fn notes_without_cards(&mut self, ids: &[NoteId]) -> Result<Vec<NoteId>>;

    /// Appends a review log entry, retrying once on an id collision
    ///
    /// ### Returns
    ///
    /// The id the entry was stored under
    fn append_review_log(&mut self, entry: &ReviewLogEntry) -> Result<i64>;
    fn review_logs_for_card(&mut self, card_id: CardId) -> Result<Vec<ReviewLogEntry>>;
    /// Id of the most recent log entry per card; cards never reviewed are absent
    fn last_review_ids(&mut self, card_ids: &[CardId]) -> Result<HashMap<CardId, i64>>;
}

/// [`Store`] backed by one pooled SQLite connection
pub struct SqliteStore {
    conn: DbConn,
}

impl SqliteStore {
    /// Takes a connection from the pool and brings its schema up to date
    ///
    /// ### Errors
    ///
    /// Returns an error if no connection is available or a migration fails
    #[instrument(skip(pool))]
    pub fn open(pool: &DbPool) -> Result<Self> {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
        debug!("Store opened");
        Ok(Self { conn })
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        AnsiTransactionManager::begin_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn load_collection(&mut self) -> Result<Option<CollectionRecord>> {
        col_repo::load_collection(&mut self.conn)
    }

    fn save_collection(&mut self, record: &CollectionRecord) -> Result<()> {
        col_repo::save_collection(&mut self.conn, record)
    }

    fn add_grave(&mut self, usn: i32, oid: i64, kind: GraveKind) -> Result<()> {
        col_repo::add_grave(&mut self.conn, usn, oid, kind)
    }

    fn max_ids(&mut self) -> Result<MaxIds> {
        let deck = deck_repo::all_decks(&mut self.conn)?.iter().map(|d| d.id).max().unwrap_or(0);
        let config = deck_repo::all_deck_configs(&mut self.conn)?.iter().map(|c| c.id).max().unwrap_or(0);
        Ok(MaxIds {
            card: card_repo::max_card_id(&mut self.conn)?,
            note: note_repo::max_note_id(&mut self.conn)?,
            revlog: revlog_repo::max_revlog_id(&mut self.conn)?,
            deck,
            config,
        })
    }

    fn all_decks(&mut self) -> Result<Vec<Deck>> {
        deck_repo::all_decks(&mut self.conn)
    }

    fn save_deck(&mut self, deck: &Deck) -> Result<()> {
        deck_repo::save_deck(&mut self.conn, deck)
    }

    fn remove_deck(&mut self, deck_id: DeckId) -> Result<()> {
        deck_repo::delete_deck(&mut self.conn, deck_id)
    }

    fn all_deck_configs(&mut self) -> Result<Vec<DeckConfig>> {
        deck_repo::all_deck_configs(&mut self.conn)
    }

    fn save_deck_config(&mut self, conf: &DeckConfig) -> Result<()> {
        deck_repo::save_deck_config(&mut self.conn, conf)
    }

    fn remove_deck_config(&mut self, config_id: DeckConfigId) -> Result<()> {
        deck_repo::delete_deck_config(&mut self.conn, config_id)
    }

    fn get_card(&mut self, card_id: CardId) -> Result<Option<Card>> {
        card_repo::get_card(&mut self.conn, card_id)
    }

    fn add_card(&mut self, card: &Card) -> Result<()> {
        card_repo::insert_card(&mut self.conn, card)
    }

    fn save_card(&mut self, card: &Card) -> Result<()> {
        card_repo::save_card(&mut self.conn, card)
    }

    fn remove_cards(&mut self, ids: &[CardId]) -> Result<usize> {
        card_repo::delete_cards(&mut self.conn, ids)
    }

    fn count_cards(&mut self, filter: &CardFilter, limit: Option<usize>) -> Result<usize> {
        card_repo::count_cards(&mut self.conn, filter, limit)
    }

    fn query_cards(&mut self, filter: &CardFilter, order: CardOrder, limit: Option<usize>) -> Result<Vec<Card>> {
        card_repo::query_cards(&mut self.conn, filter, order, limit)
    }

    fn query_card_ids(&mut self, filter: &CardFilter, order: CardOrder, limit: Option<usize>) -> Result<Vec<CardId>> {
        card_repo::query_card_ids(&mut self.conn, filter, order, limit)
    }

    fn bulk_update_cards(&mut self, filter: &CardFilter, update: &CardUpdate) -> Result<usize> {
        card_repo::bulk_update_cards(&mut self.conn, filter, update)
    }

    fn max_new_position(&mut self) -> Result<i64> {
        card_repo::max_new_position(&mut self.conn)
    }

    fn get_note(&mut self, note_id: NoteId) -> Result<Option<Note>> {
        note_repo::get_note(&mut self.conn, note_id)
    }

    fn get_notes(&mut self, note_ids: &[NoteId]) -> Result<Vec<Note>> {
        note_repo::get_notes(&mut self.conn, note_ids)
    }

    fn all_notes(&mut self) -> Result<Vec<Note>> {
        note_repo::all_notes(&mut self.conn)
    }

    fn save_note(&mut self, note: &Note) -> Result<()> {
        note_repo::save_note(&mut self.conn, note)
    }

    fn remove_notes(&mut self, ids: &[NoteId]) -> Result<usize> {
        note_repo::delete_notes(&mut self.conn, ids)
    }

    fn notes_without_cards(&mut self, ids: &[NoteId]) -> Result<Vec<NoteId>> {
        note_repo::notes_without_cards(&mut self.conn, ids)
    }

    fn append_review_log(&mut self, entry: &ReviewLogEntry) -> Result<i64> {
        revlog_repo::append_review_log(&mut self.conn, entry)
    }

    fn review_logs_for_card(&mut self, card_id: CardId) -> Result<Vec<ReviewLogEntry>> {
        revlog_repo::review_logs_for_card(&mut self.conn, card_id)
    }

    fn last_review_ids(&mut self, card_ids: &[CardId]) -> Result<HashMap<CardId, i64>> {
        revlog_repo::last_review_ids(&mut self.conn, card_ids)
    }
}

#[cfg(test)]
pub mod tests;
