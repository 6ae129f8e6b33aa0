//! The collection
//!
//! A [`Collection`] ties a [`Store`] to the in-memory state that scheduling
//! needs: the deck tree, the collection settings, the study queues, the hook
//! registry, a clock and a random number generator. Every mutating operation
//! runs inside [`Collection::transact`], so a failure part-way through leaves
//! both the store and the in-memory state as they were.

use std::collections::{BTreeSet, HashSet};

use anyhow::anyhow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock, start_of_day};
use crate::config::SchedulerConfig;
use crate::decks::{DeckManager, Stamp};
use crate::errors::{SchedError, SchedResult};
use crate::hooks::Hooks;
use crate::models::{
    Card, CardId, CardType, CollectionConf, DEFAULT_DECK_ID, Deck, DeckConfig, DeckConfigId,
    DeckId, FilteredDeck, NewCardOrder, Note, NoteId, Queue,
};
use crate::repo::{CardFilter, CardOrder, CollectionRecord, GraveKind, Store};
use crate::sched::SchedState;

/// Update sequence number stamped on local changes that have not been synced
pub const LOCAL_USN: i32 = -1;

/// How a collection is opened
pub struct CollectionOptions {
    pub clock: Box<dyn Clock>,
    /// Seed for fuzz, jitter and shuffles; `None` seeds from the OS
    pub rng_seed: Option<u64>,
    pub scheduler: SchedulerConfig,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            clock: Box::new(SystemClock),
            rng_seed: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl std::fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("rng_seed", &self.rng_seed)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

pub struct Collection<S: Store> {
    pub(crate) store: S,
    pub(crate) decks: DeckManager,
    pub(crate) conf: CollectionConf,
    crt: i64,
    mtime: i64,
    usn: i32,
    conf_dirty: bool,
    pub(crate) sched: SchedState,
    pub(crate) sched_config: SchedulerConfig,
    hooks: Hooks,
    clock: Box<dyn Clock>,
    pub(crate) rng: StdRng,
    last_id: i64,
    last_revlog_id: i64,
    tx_depth: u32,
}

impl<S: Store> Collection<S> {
    /// Initialises a new collection in an empty store
    ///
    /// ### Errors
    ///
    /// Returns a storage error if the store already holds a collection
    pub fn create(store: S, options: CollectionOptions) -> SchedResult<Self> {
        let mut store = store;
        if store.load_collection()?.is_some() {
            return Err(SchedError::Storage(anyhow!("store already holds a collection")));
        }
        Self::open(store, options)
    }

    /// Opens the collection held by a store, initialising it if the store is empty
    ///
    /// ### Errors
    ///
    /// Returns a storage error if the store cannot be read or written
    #[instrument(skip(store, options))]
    pub fn open(mut store: S, options: CollectionOptions) -> SchedResult<Self> {
        let now_ms = options.clock.now_millis();
        let stamp = Stamp { now_ms, usn: LOCAL_USN };
        let (record, fresh) = match store.load_collection()? {
            Some(record) => (record, false),
            None => {
                let crt = start_of_day(options.clock.now_secs());
                info!(crt, "Creating new collection");
                (CollectionRecord { crt, mtime: now_ms / 1000, usn: 0, conf: CollectionConf::default() }, true)
            }
        };
        let decks = DeckManager::load(store.all_decks()?, store.all_deck_configs()?, stamp);
        let max_ids = store.max_ids()?;
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut col = Self {
            store,
            decks,
            conf: record.conf,
            crt: record.crt,
            mtime: record.mtime,
            usn: record.usn,
            conf_dirty: fresh,
            sched: SchedState::default(),
            sched_config: options.scheduler.sanitized(),
            hooks: Hooks::new(),
            clock: options.clock,
            rng,
            last_id: max_ids.card.max(max_ids.note).max(max_ids.deck).max(max_ids.config),
            last_revlog_id: max_ids.revlog,
            tx_depth: 0,
        };
        col.transact(|col| col.update_cutoff())?;
        debug!(today = col.sched.today, "Collection opened");
        Ok(col)
    }

    /// Runs `op` inside a store transaction
    ///
    /// Nested calls join the outermost transaction. Dirty decks, configs and
    /// collection settings are written back before the commit. If `op` or the
    /// write-back fails, the transaction is rolled back, the deck tree and
    /// settings are reloaded from the store and the study queues are marked
    /// stale.
    pub(crate) fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> SchedResult<T>) -> SchedResult<T> {
        let outermost = self.tx_depth == 0;
        if outermost {
            self.store.begin()?;
        }
        self.tx_depth += 1;
        let result = op(self).and_then(|value| {
            if outermost {
                self.flush()?;
            }
            Ok(value)
        });
        self.tx_depth -= 1;
        if !outermost {
            return result;
        }
        match result {
            Ok(value) => {
                if let Err(err) = self.store.commit() {
                    self.recover_after_rollback();
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                self.recover_after_rollback();
                Err(err)
            }
        }
    }

    fn recover_after_rollback(&mut self) {
        if let Err(err) = self.store.rollback() {
            warn!("Rollback failed: {:#}", err);
        }
        let stamp = self.stamp();
        match (self.store.all_decks(), self.store.all_deck_configs(), self.store.load_collection()) {
            (Ok(decks), Ok(configs), Ok(record)) => {
                self.decks = DeckManager::load(decks, configs, stamp);
                self.decks.roll_over(self.sched.today);
                if let Some(record) = record {
                    self.conf = record.conf;
                    self.mtime = record.mtime;
                }
                self.conf_dirty = false;
            }
            _ => warn!("Could not reload collection state after rollback"),
        }
        self.sched.invalidate();
    }

    fn flush(&mut self) -> SchedResult<()> {
        let changes = self.decks.take_changes();
        for deck in &changes.decks {
            self.store.save_deck(deck)?;
        }
        for deck_id in &changes.removed_decks {
            self.store.remove_deck(*deck_id)?;
        }
        for conf in &changes.configs {
            self.store.save_deck_config(conf)?;
        }
        for config_id in &changes.removed_configs {
            self.store.remove_deck_config(*config_id)?;
        }
        if self.conf_dirty {
            self.mtime = self.now_secs();
            let record = CollectionRecord { crt: self.crt, mtime: self.mtime, usn: self.usn, conf: self.conf.clone() };
            self.store.save_collection(&record)?;
            self.conf_dirty = false;
        }
        Ok(())
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn now_secs(&self) -> i64 {
        self.clock.now_secs()
    }

    /// Collection creation time, epoch seconds
    pub fn crt(&self) -> i64 {
        self.crt
    }

    /// Days elapsed since the collection was created, as of the last cutoff update
    pub fn today(&self) -> i64 {
        self.sched.today
    }

    /// End of the current study day, epoch seconds
    pub fn day_cutoff(&self) -> i64 {
        self.sched.day_cutoff
    }

    pub fn conf(&self) -> &CollectionConf {
        &self.conf
    }

    /// Changes collection-wide settings
    pub fn update_conf(&mut self, f: impl FnOnce(&mut CollectionConf)) -> SchedResult<()> {
        self.transact(|col| {
            f(&mut col.conf);
            col.conf_dirty = true;
            col.sched.invalidate();
            Ok(())
        })
    }

    pub(crate) fn mark_conf_dirty(&mut self) {
        self.conf_dirty = true;
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn scheduler_config(&self) -> &SchedulerConfig {
        &self.sched_config
    }

    pub(crate) fn usn(&self) -> i32 {
        LOCAL_USN
    }

    pub(crate) fn stamp(&self) -> Stamp {
        Stamp { now_ms: self.now_millis(), usn: self.usn() }
    }

    /// A fresh id, derived from the clock and strictly greater than any id handed out before
    pub(crate) fn next_id(&mut self) -> i64 {
        self.last_id = self.now_millis().max(self.last_id + 1);
        self.last_id
    }

    /// A fresh review log id
    pub(crate) fn next_revlog_id(&mut self) -> i64 {
        self.last_revlog_id = self.now_millis().max(self.last_revlog_id + 1);
        self.last_revlog_id
    }

    /// Records the id a log entry was finally stored under
    pub(crate) fn note_revlog_id(&mut self, id: i64) {
        self.last_revlog_id = self.last_revlog_id.max(id);
    }

    /// The next new-card position
    pub(crate) fn next_position(&mut self) -> i64 {
        let pos = self.conf.next_pos;
        self.conf.next_pos += 1;
        self.conf_dirty = true;
        pos
    }

    // ---- cards ----

    /// Loads a card
    ///
    /// ### Errors
    ///
    /// Returns `CardNotFound` if no card has the given id
    pub fn get_card(&mut self, card_id: CardId) -> SchedResult<Card> {
        self.store.get_card(card_id)?.ok_or(SchedError::CardNotFound(card_id))
    }

    /// Writes a card back as it is
    pub fn update_card(&mut self, card: &mut Card) -> SchedResult<()> {
        self.transact(|col| {
            card.mtime = col.now_secs();
            card.usn = col.usn();
            col.store.save_card(card)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Deletes cards, logging graves, and deletes notes left without cards
    ///
    /// ### Returns
    ///
    /// The number of cards deleted
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn remove_cards(&mut self, card_ids: &[CardId]) -> SchedResult<usize> {
        if card_ids.is_empty() {
            return Ok(0);
        }
        self.transact(|col| {
            let cards = col.store.query_cards(&CardFilter::new().ids(card_ids), CardOrder::Id, None)?;
            let note_ids: Vec<NoteId> =
                cards.iter().map(|c| c.nid).collect::<BTreeSet<_>>().into_iter().collect();
            let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
            let removed = col.store.remove_cards(&ids)?;
            let usn = col.usn();
            for id in &ids {
                col.store.add_grave(usn, *id, GraveKind::Card)?;
            }
            let orphans = col.store.notes_without_cards(&note_ids)?;
            if !orphans.is_empty() {
                col.store.remove_notes(&orphans)?;
                for nid in &orphans {
                    col.store.add_grave(usn, *nid, GraveKind::Note)?;
                }
            }
            col.sched.invalidate();
            info!(cards = removed, notes = orphans.len(), "Removed cards");
            Ok(removed)
        })
    }

    // ---- notes ----

    /// Adds a note and generates one card per template ordinal
    ///
    /// ### Arguments
    ///
    /// * `note` - The note to add; its id, mtime and usn are assigned here
    /// * `deck_id` - The deck for the new cards; a filtered deck falls back to the default deck
    /// * `ordinals` - Template ordinals to generate cards for; empty means ordinal 0
    ///
    /// ### Returns
    ///
    /// The ids of the generated cards
    ///
    /// ### Errors
    ///
    /// Returns `DeckNotFound` if the deck does not exist
    #[instrument(skip(self, note), fields(deck_id = deck_id))]
    pub fn add_note(&mut self, note: &mut Note, deck_id: DeckId, ordinals: &[u32]) -> SchedResult<Vec<CardId>> {
        let deck = self.decks.get(deck_id).ok_or(SchedError::DeckNotFound(deck_id))?;
        let deck_id = if deck.is_filtered() { DEFAULT_DECK_ID } else { deck_id };
        let ordinals: Vec<u32> = if ordinals.is_empty() {
            vec![0]
        } else {
            ordinals.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
        };

        self.transact(|col| {
            note.id = col.next_id();
            note.mtime = col.now_secs();
            note.usn = col.usn();
            col.store.save_note(note)?;

            let position = col.next_position();
            let due = col.due_for_deck(deck_id, position);
            let mut card_ids = Vec::with_capacity(ordinals.len());
            for ord in ordinals {
                let mut card = Card::new(col.next_id(), note.id, deck_id, ord, due);
                card.mtime = note.mtime;
                card.usn = note.usn;
                col.store.add_card(&card)?;
                card_ids.push(card.id);
            }
            col.sched.invalidate();
            debug!(note_id = note.id, cards = card_ids.len(), "Added note");
            Ok(card_ids)
        })
    }

    /// New-card due for a deck: the position itself, or a random position
    /// seeded by it when the deck orders new cards randomly
    fn due_for_deck(&self, deck_id: DeckId, position: i64) -> i64 {
        let conf = self.decks.config_for_deck(deck_id);
        match conf.new.order {
            NewCardOrder::Due => position,
            NewCardOrder::Random => {
                let mut rng = StdRng::seed_from_u64(position as u64);
                rng.random_range(1..position.max(1000))
            }
        }
    }

    pub fn get_note(&mut self, note_id: NoteId) -> SchedResult<Note> {
        self.store.get_note(note_id)?.ok_or(SchedError::NoteNotFound(note_id))
    }

    /// Saves changed fields or tags of an existing note
    pub fn update_note(&mut self, note: &mut Note) -> SchedResult<()> {
        if self.store.get_note(note.id)?.is_none() {
            return Err(SchedError::NoteNotFound(note.id));
        }
        self.transact(|col| {
            note.mtime = col.now_secs();
            note.usn = col.usn();
            col.store.save_note(note)?;
            Ok(())
        })
    }

    /// Deletes notes along with all their cards
    ///
    /// ### Returns
    ///
    /// The number of notes deleted; unknown ids are skipped
    pub fn remove_notes(&mut self, note_ids: &[NoteId]) -> SchedResult<usize> {
        if note_ids.is_empty() {
            return Ok(0);
        }
        self.transact(|col| {
            let existing: Vec<NoteId> = col.store.get_notes(note_ids)?.iter().map(|n| n.id).collect();
            if existing.is_empty() {
                return Ok(0);
            }
            // Notes whose last card goes are deleted (and buried) by remove_cards
            let card_ids = col.store.query_card_ids(&CardFilter::new().notes(&existing), CardOrder::Id, None)?;
            col.remove_cards(&card_ids)?;

            let cardless: Vec<NoteId> = col.store.get_notes(&existing)?.iter().map(|n| n.id).collect();
            if !cardless.is_empty() {
                col.store.remove_notes(&cardless)?;
                let usn = col.usn();
                for nid in &cardless {
                    col.store.add_grave(usn, *nid, GraveKind::Note)?;
                }
            }
            debug!(notes = existing.len(), cards = card_ids.len(), "Removed notes");
            Ok(existing.len())
        })
    }

    // ---- decks ----

    pub fn deck(&self, deck_id: DeckId) -> Option<&Deck> {
        self.decks.get(deck_id)
    }

    /// Every deck, sorted by name
    pub fn all_decks(&self) -> Vec<Deck> {
        self.decks.all_sorted().into_iter().cloned().collect()
    }

    /// Looks up a deck by name, optionally creating it and its parents
    pub fn deck_id(&mut self, name: &str, create: bool) -> SchedResult<Option<DeckId>> {
        if !create {
            let stamp = self.stamp();
            return self.decks.id(name, false, stamp);
        }
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.id(name, true, stamp)
        })
    }

    /// Creates a filtered deck with default terms and selects it
    pub fn add_filtered_deck(&mut self, name: &str) -> SchedResult<DeckId> {
        self.transact(|col| {
            let stamp = col.stamp();
            let deck_id = col.decks.add_filtered(name, stamp)?;
            col.select_deck(deck_id)?;
            Ok(deck_id)
        })
    }

    /// Replaces the search terms and options of a filtered deck
    pub fn update_filtered_deck(&mut self, deck_id: DeckId, options: FilteredDeck) -> SchedResult<()> {
        if !self.decks.is_filtered(deck_id) {
            return Err(SchedError::NotFiltered(deck_id));
        }
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.update_deck(deck_id, stamp, |deck| {
                if let Some(filtered) = deck.filtered_mut() {
                    *filtered = options;
                }
            })
        })
    }

    pub fn rename_deck(&mut self, deck_id: DeckId, new_name: &str) -> SchedResult<()> {
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.rename(deck_id, new_name, stamp)?;
            col.refresh_active_decks()
        })
    }

    pub fn rename_deck_for_drag_and_drop(&mut self, dragged: DeckId, onto: Option<DeckId>) -> SchedResult<()> {
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.rename_for_drag_and_drop(dragged, onto, stamp)?;
            col.refresh_active_decks()
        })
    }

    /// Removes a deck
    ///
    /// The default deck is never removed; when nested it is moved back to the
    /// top level instead. Removing a filtered deck returns its cards home.
    /// For a normal deck, `cards_too` deletes its cards (including those
    /// currently borrowed by filtered decks); otherwise they move to the
    /// default deck.
    ///
    /// ### Errors
    ///
    /// Returns a storage error if the cards cannot be updated
    #[instrument(skip(self))]
    pub fn remove_deck(&mut self, deck_id: DeckId, cards_too: bool, children_too: bool) -> SchedResult<()> {
        self.transact(|col| col.remove_deck_inner(deck_id, cards_too, children_too))
    }

    pub(crate) fn remove_deck_inner(&mut self, deck_id: DeckId, cards_too: bool, children_too: bool) -> SchedResult<()> {
        if deck_id == DEFAULT_DECK_ID {
            let nested = self.decks.get(deck_id).is_some_and(|d| d.parent_name().is_some());
            if nested {
                let stamp = self.stamp();
                self.decks.rename(deck_id, "Default", stamp)?;
            }
            return Ok(());
        }
        let Some(deck) = self.decks.get(deck_id).cloned() else {
            return Ok(());
        };
        let usn = self.usn();
        self.store.add_grave(usn, deck_id, GraveKind::Deck)?;

        if deck.is_filtered() {
            self.empty_filtered(deck_id)?;
        }
        if children_too {
            for (_, child) in self.decks.children(deck_id) {
                if self.decks.contains(child) {
                    self.remove_deck_inner(child, cards_too, true)?;
                }
            }
        }
        if !deck.is_filtered() {
            if cards_too {
                let mut ids = self.store.query_card_ids(&CardFilter::new().deck(deck_id), CardOrder::Id, None)?;
                ids.extend(self.store.query_card_ids(&CardFilter::new().original_decks(&[deck_id]), CardOrder::Id, None)?);
                self.remove_cards(&ids)?;
            } else {
                self.rehome_cards(deck_id)?;
            }
        }

        self.decks.remove_entry(deck_id);
        info!(deck_id, "Removed deck '{}'", deck.name);
        if self.conf.active_decks.contains(&deck_id) || self.conf.cur_deck == deck_id {
            let fallback = self.decks.all_ids().first().copied().unwrap_or(DEFAULT_DECK_ID);
            self.select_deck(fallback)?;
        }
        self.sched.invalidate();
        Ok(())
    }

    /// Points cards of a deck that is going away at the default deck
    fn rehome_cards(&mut self, deck_id: DeckId) -> SchedResult<()> {
        let now = self.now_secs();
        let usn = self.usn();
        let mut affected = self.store.query_cards(&CardFilter::new().deck(deck_id), CardOrder::Id, None)?;
        affected.extend(self.store.query_cards(&CardFilter::new().original_decks(&[deck_id]), CardOrder::Id, None)?);
        for mut card in affected {
            if card.did == deck_id {
                card.did = DEFAULT_DECK_ID;
            }
            if card.odid == deck_id {
                card.odid = DEFAULT_DECK_ID;
            }
            card.mtime = now;
            card.usn = usn;
            self.store.save_card(&card)?;
        }
        Ok(())
    }

    /// Makes a deck current; it and its descendants become the active decks
    pub fn select_deck(&mut self, deck_id: DeckId) -> SchedResult<()> {
        if !self.decks.contains(deck_id) {
            return Err(SchedError::DeckNotFound(deck_id));
        }
        self.transact(|col| {
            col.conf.cur_deck = deck_id;
            col.conf.active_decks = col.decks.deck_and_child_ids(deck_id);
            col.conf_dirty = true;
            col.sched.invalidate();
            debug!(deck_id, active = col.conf.active_decks.len(), "Selected deck");
            Ok(())
        })
    }

    /// Recomputes the active decks after the tree changed shape
    fn refresh_active_decks(&mut self) -> SchedResult<()> {
        let current = if self.decks.contains(self.conf.cur_deck) { self.conf.cur_deck } else { DEFAULT_DECK_ID };
        self.select_deck(current)
    }

    pub fn current_deck_id(&self) -> DeckId {
        self.conf.cur_deck
    }

    pub fn active_decks(&self) -> &[DeckId] {
        &self.conf.active_decks
    }

    pub fn deck_children(&self, deck_id: DeckId) -> Vec<(String, DeckId)> {
        self.decks.children(deck_id)
    }

    pub fn deck_parents(&self, deck_id: DeckId) -> Vec<Deck> {
        self.decks.parents(deck_id).into_iter().cloned().collect()
    }

    /// Toggles a deck's collapsed state; returns the new state
    pub fn collapse_deck(&mut self, deck_id: DeckId) -> SchedResult<bool> {
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.collapse(deck_id, stamp)
        })
    }

    // ---- deck configs ----

    pub fn config(&self, config_id: DeckConfigId) -> Option<&DeckConfig> {
        self.decks.config(config_id)
    }

    /// The config governing a deck, or the default config for filtered decks
    pub fn config_for_deck(&self, deck_id: DeckId) -> DeckConfig {
        self.decks.config_for_deck(deck_id)
    }

    /// Adds a config, copying `clone_from` when given
    pub fn add_config(&mut self, name: &str, clone_from: Option<DeckConfigId>) -> SchedResult<DeckConfigId> {
        let source = match clone_from {
            Some(id) => Some(self.decks.config(id).cloned().ok_or(SchedError::ConfigNotFound(id))?),
            None => None,
        };
        self.transact(|col| {
            let stamp = col.stamp();
            Ok(col.decks.add_config(name, source.as_ref(), stamp))
        })
    }

    pub fn update_config(&mut self, conf: DeckConfig) -> SchedResult<()> {
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.update_config(conf, stamp)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    pub fn remove_config(&mut self, config_id: DeckConfigId) -> SchedResult<()> {
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.remove_config(config_id, stamp)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    pub fn set_config(&mut self, deck_id: DeckId, config_id: DeckConfigId) -> SchedResult<()> {
        self.transact(|col| {
            let stamp = col.stamp();
            col.decks.set_config(deck_id, config_id, stamp)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Resets a config to the defaults
    ///
    /// Decks whose new cards were in random order are put back in added order.
    pub fn restore_config_to_default(&mut self, config_id: DeckConfigId) -> SchedResult<()> {
        self.transact(|col| {
            let stamp = col.stamp();
            let old = col.decks.restore_config_to_default(config_id, stamp)?;
            if old.new.order == NewCardOrder::Random {
                for deck_id in col.decks.dids_for_config(config_id) {
                    col.order_cards(deck_id)?;
                }
            }
            col.sched.invalidate();
            Ok(())
        })
    }

    pub fn dids_for_config(&self, config_id: DeckConfigId) -> Vec<DeckId> {
        self.decks.dids_for_config(config_id)
    }

    // ---- maintenance ----

    /// Repairs the deck tree and cards that point at missing decks
    ///
    /// ### Returns
    ///
    /// The number of repairs made
    #[instrument(skip(self))]
    pub fn check_integrity(&mut self) -> SchedResult<usize> {
        self.transact(|col| {
            let stamp = col.stamp();
            let mut repairs = col.decks.check_integrity(stamp);

            let known: HashSet<DeckId> = col.decks.all_ids().into_iter().collect();
            let now = col.now_secs();
            let usn = col.usn();
            for mut card in col.store.query_cards(&CardFilter::new(), CardOrder::Id, None)? {
                let mut changed = false;
                if !known.contains(&card.did) {
                    warn!(card_id = card.id, deck_id = card.did, "Card in missing deck, moving to default deck");
                    card.did = DEFAULT_DECK_ID;
                    changed = true;
                }
                if card.odid != 0 && !known.contains(&card.odid) {
                    card.odid = DEFAULT_DECK_ID;
                    changed = true;
                }
                if card.ctype == CardType::Review && card.queue == Queue::New && card.odid == 0 {
                    card.queue = Queue::Review;
                    changed = true;
                }
                if changed {
                    card.mtime = now;
                    card.usn = usn;
                    col.store.save_card(&card)?;
                    repairs += 1;
                }
            }

            if !known.contains(&col.conf.cur_deck) || col.conf.active_decks.iter().any(|d| !known.contains(d)) {
                col.select_deck(DEFAULT_DECK_ID)?;
                repairs += 1;
            }
            col.sched.invalidate();
            if repairs > 0 {
                info!(repairs, "Integrity check repaired collection");
            }
            Ok(repairs)
        })
    }
}
