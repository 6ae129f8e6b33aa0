//! Bulk card operations: burying, suspending, forgetting and repositioning

use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument};

use crate::collection::Collection;
use crate::errors::SchedResult;
use crate::models::{Card, CardId, CardType, DeckId, NoteId, Queue, STARTING_FACTOR};
use crate::repo::{CardFilter, CardOrder, CardUpdate, DueBound, QueueChange, Store};

impl<S: Store> Collection<S> {
    /// Buries the new and due review siblings of a card
    ///
    /// Siblings are always pulled out of the in-memory queues; whether they
    /// are also buried in the store depends on the `bury` flags of the
    /// card's new and review options.
    pub(crate) fn bury_siblings(&mut self, card: &Card) -> SchedResult<()> {
        let conf = self.card_config(card);
        let today = self.sched.today;
        let filter = CardFilter::new()
            .note(card.nid)
            .excluding(card.id)
            .queues(&[Queue::New, Queue::Review]);
        let siblings = self.store.query_cards(&filter, CardOrder::Unordered, None)?;

        let mut to_bury = Vec::new();
        for sibling in siblings {
            if sibling.queue == Queue::Review {
                if sibling.due > today {
                    continue;
                }
                if conf.rev.bury {
                    to_bury.push(sibling.id);
                }
                self.sched.rev_queue.retain(|id| *id != sibling.id);
            } else {
                if conf.new.bury {
                    to_bury.push(sibling.id);
                }
                self.sched.new_queue.retain(|id| *id != sibling.id);
            }
        }
        if !to_bury.is_empty() {
            self.set_queue(&CardFilter::new().ids(&to_bury), QueueChange::Set(Queue::Buried))?;
            debug!(card_id = card.id, buried = to_bury.len(), "Buried siblings");
        }
        Ok(())
    }

    fn set_queue(&mut self, filter: &CardFilter, queue: QueueChange) -> SchedResult<usize> {
        let update = CardUpdate { queue, usn: self.usn(), mtime: self.now_secs() };
        Ok(self.store.bulk_update_cards(filter, &update)?)
    }

    /// Suspends cards, returning them from filtered decks and learning first
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn suspend_cards(&mut self, card_ids: &[CardId]) -> SchedResult<()> {
        self.transact(|col| {
            col.remove_from_filtered(card_ids)?;
            col.remove_learning(Some(card_ids))?;
            col.set_queue(&CardFilter::new().ids(card_ids), QueueChange::Set(Queue::Suspended))?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Returns suspended cards to the queue matching their type
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn unsuspend_cards(&mut self, card_ids: &[CardId]) -> SchedResult<()> {
        self.transact(|col| {
            let filter = CardFilter::new().ids(card_ids).queue(Queue::Suspended);
            col.set_queue(&filter, QueueChange::RestoreFromType)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Hides cards until the next day
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn bury_cards(&mut self, card_ids: &[CardId]) -> SchedResult<()> {
        self.transact(|col| {
            col.remove_from_filtered(card_ids)?;
            col.remove_learning(Some(card_ids))?;
            col.set_queue(&CardFilter::new().ids(card_ids), QueueChange::Set(Queue::Buried))?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Buries every studyable card of a note
    pub fn bury_note(&mut self, note_id: NoteId) -> SchedResult<()> {
        let filter = CardFilter::new()
            .note(note_id)
            .queues(&[Queue::New, Queue::Learning, Queue::Review, Queue::DayLearning]);
        let card_ids = self.store.query_card_ids(&filter, CardOrder::Id, None)?;
        self.bury_cards(&card_ids)
    }

    /// Unburies every card in the collection
    pub fn unbury_cards(&mut self) -> SchedResult<()> {
        self.transact(|col| col.unbury_all())
    }

    pub(crate) fn unbury_all(&mut self) -> SchedResult<()> {
        self.conf.last_unburied = self.sched.today;
        self.mark_conf_dirty();
        let count = self.set_queue(&CardFilter::new().queue(Queue::Buried), QueueChange::RestoreFromType)?;
        if count > 0 {
            info!(count, "Unburied cards");
        }
        self.sched.invalidate();
        Ok(())
    }

    /// Unburies the cards of the active decks
    pub fn unbury_cards_for_deck(&mut self) -> SchedResult<()> {
        self.transact(|col| {
            let filter = CardFilter::new().decks(&col.conf.active_decks).queue(Queue::Buried);
            col.set_queue(&filter, QueueChange::RestoreFromType)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// True if any card in the active decks is buried
    pub fn have_buried(&mut self) -> SchedResult<bool> {
        let filter = CardFilter::new().decks(&self.conf.active_decks).queue(Queue::Buried);
        Ok(self.store.count_cards(&filter, Some(1))? > 0)
    }

    /// Takes cards out of learning
    ///
    /// Relearning reviews go back to the review queue with the due date they
    /// had before they lapsed. Cards learning for the first time become new
    /// again. With `None`, every learning card in the collection is affected.
    pub fn remove_learning(&mut self, card_ids: Option<&[CardId]>) -> SchedResult<()> {
        self.transact(|col| {
            let mut filter = CardFilter::new().queues(&[Queue::Learning, Queue::DayLearning]);
            if let Some(ids) = card_ids {
                filter = filter.ids(ids);
            }
            let now = col.now_secs();
            let usn = col.usn();
            let mut relearning = 0;
            let mut to_forget = Vec::new();
            for mut card in col.store.query_cards(&filter, CardOrder::Id, None)? {
                if card.ctype == CardType::Review {
                    card.due = card.odue;
                    card.queue = Queue::Review;
                    card.odue = 0;
                    card.mtime = now;
                    card.usn = usn;
                    col.store.save_card(&card)?;
                    relearning += 1;
                } else {
                    to_forget.push(card.id);
                }
            }
            col.reset_cards(&to_forget)?;
            debug!(relearning, forgotten = to_forget.len(), "Removed cards from learning");
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Turns cards back into new cards placed after every existing new card
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn reset_cards(&mut self, card_ids: &[CardId]) -> SchedResult<()> {
        if card_ids.is_empty() {
            return Ok(());
        }
        self.transact(|col| {
            col.remove_from_filtered(card_ids)?;
            let now = col.now_secs();
            let usn = col.usn();
            for mut card in col.store.query_cards(&CardFilter::new().ids(card_ids), CardOrder::Id, None)? {
                card.ctype = CardType::New;
                card.queue = Queue::New;
                card.ivl = 0;
                card.due = 0;
                card.odue = 0;
                card.factor = STARTING_FACTOR;
                card.mtime = now;
                card.usn = usn;
                col.store.save_card(&card)?;
            }
            let start = col.store.max_new_position()? + 1;
            col.sort_cards(card_ids, start, 1, false, false)?;
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Makes cards reviews due in a random number of days between `min_days`
    /// and `max_days`
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn reschedule_cards(&mut self, card_ids: &[CardId], min_days: u32, max_days: u32) -> SchedResult<()> {
        let (low, high) = if min_days <= max_days { (min_days, max_days) } else { (max_days, min_days) };
        self.transact(|col| {
            col.remove_from_filtered(card_ids)?;
            let now = col.now_secs();
            let usn = col.usn();
            let today = col.sched.today;
            for mut card in col.store.query_cards(&CardFilter::new().ids(card_ids), CardOrder::Id, None)? {
                let days = col.rng.random_range(low..=high);
                card.ctype = CardType::Review;
                card.queue = Queue::Review;
                card.ivl = days.max(1);
                card.due = today + i64::from(days);
                card.odue = 0;
                card.factor = STARTING_FACTOR;
                card.mtime = now;
                card.usn = usn;
                col.store.save_card(&card)?;
            }
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Gives new cards consecutive positions, one position per note
    ///
    /// ### Arguments
    ///
    /// * `card_ids` - Cards to reposition; notes are numbered in the order
    ///   their first card appears here
    /// * `start` - Position of the first note
    /// * `step` - Distance between notes
    /// * `shuffle` - Randomise the note order first
    /// * `shift` - Move other new cards at or after `start` out of the way
    #[instrument(skip(self, card_ids), fields(count = card_ids.len()))]
    pub fn sort_cards(
        &mut self,
        card_ids: &[CardId],
        start: i64,
        step: i64,
        shuffle: bool,
        shift: bool,
    ) -> SchedResult<()> {
        self.transact(|col| {
            let cards = col.store.query_cards(&CardFilter::new().ids(card_ids), CardOrder::Unordered, None)?;
            let by_id: HashMap<CardId, &Card> = cards.iter().map(|c| (c.id, c)).collect();
            let mut note_ids: Vec<NoteId> = Vec::new();
            let mut seen = BTreeSet::new();
            for id in card_ids {
                if let Some(card) = by_id.get(id) {
                    if seen.insert(card.nid) {
                        note_ids.push(card.nid);
                    }
                }
            }
            if note_ids.is_empty() {
                return Ok(());
            }
            if shuffle {
                note_ids.shuffle(&mut col.rng);
            }
            let positions: HashMap<NoteId, i64> =
                note_ids.iter().enumerate().map(|(i, nid)| (*nid, start + i as i64 * step)).collect();
            let high = start + (note_ids.len() as i64 - 1) * step;

            let now = col.now_secs();
            let usn = col.usn();
            if shift {
                let selected: BTreeSet<CardId> = card_ids.iter().copied().collect();
                let filter = CardFilter::new().card_type(CardType::New).due(DueBound::AtOrAfter(start));
                let others: Vec<Card> = col
                    .store
                    .query_cards(&filter, CardOrder::Due, None)?
                    .into_iter()
                    .filter(|c| !selected.contains(&c.id))
                    .collect();
                if let Some(low) = others.iter().map(|c| c.due).min() {
                    let shift_by = high - low + 1;
                    for mut card in others.into_iter().filter(|c| c.queue == Queue::New && c.due >= low) {
                        card.due += shift_by;
                        card.mtime = now;
                        card.usn = usn;
                        col.store.save_card(&card)?;
                    }
                }
            }

            for card in cards.iter().filter(|c| c.ctype == CardType::New) {
                let Some(position) = positions.get(&card.nid) else {
                    continue;
                };
                let mut card = card.clone();
                card.due = *position;
                card.mtime = now;
                card.usn = usn;
                col.store.save_card(&card)?;
            }
            col.sched.invalidate();
            Ok(())
        })
    }

    /// Puts a deck's new cards in random order
    pub fn randomize_cards(&mut self, deck_id: DeckId) -> SchedResult<()> {
        let card_ids = self.store.query_card_ids(&CardFilter::new().deck(deck_id), CardOrder::Id, None)?;
        self.sort_cards(&card_ids, 1, 1, true, false)
    }

    /// Puts a deck's new cards back in the order they were added
    pub fn order_cards(&mut self, deck_id: DeckId) -> SchedResult<()> {
        let card_ids = self.store.query_card_ids(&CardFilter::new().deck(deck_id), CardOrder::Id, None)?;
        self.sort_cards(&card_ids, 1, 1, false, false)
    }
}
