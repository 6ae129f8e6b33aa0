//! Study scheduler
//!
//! The scheduler is a set of `impl Collection` blocks over the in-memory
//! [`SchedState`]. Queues hold card ids only; cards are loaded from the store
//! when they are popped. Counts are computed with the walking-limit
//! algorithm so a child deck can never use up more of a parent's daily
//! allowance than the parent has left.
//!
//! - `new`, `learning`, `review`: resetting and filling each queue, and the
//!   answer state machine for learning and review cards
//! - `intervals`: the pure interval arithmetic
//! - `bury`: bury/suspend/forget and other bulk card operations
//! - `dynamic`: building and emptying filtered decks
//! - `due_tree`: the per-deck due counts shown in a deck list

mod bury;
mod due_tree;
mod dynamic;
pub mod intervals;
mod learning;
mod new;
mod review;

pub use due_tree::{DeckDueEntry, DeckDueNode};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::clock::SECONDS_PER_DAY;
use crate::collection::Collection;
use crate::errors::{SchedError, SchedResult};
use crate::models::{
    Card, CardId, CardType, Deck, DeckId, Grade, LapseConfig, NewCardOrder, NewConfig, Queue,
    RevConfig, ReviewLogEntry, ReviewType,
};
use crate::repo::{CardFilter, DueBound, Store};

/// Cards waiting to be studied, per bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub new: usize,
    pub learning: usize,
    pub review: usize,
}

/// Session state of the scheduler; rebuilt by [`Collection::reset`]
#[derive(Debug, Default)]
pub struct SchedState {
    pub(crate) today: i64,
    pub(crate) day_cutoff: i64,
    pub(crate) have_queues: bool,
    /// Cards shown this session
    pub(crate) reps: u32,
    pub(crate) new_count: usize,
    pub(crate) lrn_count: usize,
    pub(crate) rev_count: usize,
    /// Popped from the back
    pub(crate) new_queue: Vec<CardId>,
    pub(crate) lrn_queue: BinaryHeap<Reverse<(i64, CardId)>>,
    pub(crate) lrn_day_queue: Vec<CardId>,
    pub(crate) rev_queue: Vec<CardId>,
    pub(crate) new_dids: VecDeque<DeckId>,
    pub(crate) lrn_dids: VecDeque<DeckId>,
    pub(crate) rev_dids: VecDeque<DeckId>,
    pub(crate) new_card_modulus: usize,
}

impl SchedState {
    /// Marks the queues stale; the next pop rebuilds them
    pub(crate) fn invalidate(&mut self) {
        self.have_queues = false;
    }
}

/// Scheduling options in effect for one card
///
/// Built from the home deck's config, with the overrides of the filtered
/// deck the card currently sits in.
#[derive(Debug, Clone)]
pub(crate) struct CardConfig {
    pub new: NewConfig,
    pub lapse: LapseConfig,
    pub rev: RevConfig,
    pub max_taken: u32,
    /// Whether answers change the card's long-term schedule
    pub resched: bool,
    pub filtered: bool,
}

impl CardConfig {
    /// Steps used while learning: relearning steps for lapsed reviews
    pub fn learn_delays(&self, card_type: CardType) -> &[f32] {
        if card_type == CardType::Review { &self.lapse.delays } else { &self.new.delays }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LimitKind {
    New,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatKind {
    New,
    Learning,
    Review,
    Time,
}

impl<S: Store> Collection<S> {
    /// Recomputes the day boundaries and rebuilds every queue
    #[instrument(skip(self))]
    pub fn reset(&mut self) -> SchedResult<()> {
        self.transact(|col| col.reset_inner())
    }

    fn reset_inner(&mut self) -> SchedResult<()> {
        self.update_cutoff()?;
        self.reset_lrn()?;
        self.reset_rev()?;
        self.reset_new()?;
        self.sched.have_queues = true;
        debug!(
            new = self.sched.new_count,
            learning = self.sched.lrn_count,
            review = self.sched.rev_count,
            "Queues reset"
        );
        Ok(())
    }

    /// Rebuilds the queues if they are stale or the day has rolled over
    pub fn refresh_queues(&mut self) -> SchedResult<()> {
        self.transact(|col| col.refresh_inner())
    }

    fn refresh_inner(&mut self) -> SchedResult<()> {
        if self.now_secs() > self.sched.day_cutoff || !self.sched.have_queues {
            self.reset_inner()?;
        }
        Ok(())
    }

    /// Works out which study day it is, resets stale per-day deck counters,
    /// and unburies cards once a new day has started
    pub(crate) fn update_cutoff(&mut self) -> SchedResult<()> {
        let old_today = self.sched.today;
        let today = (self.now_secs() - self.crt()).div_euclid(SECONDS_PER_DAY);
        self.sched.today = today;
        self.sched.day_cutoff = self.crt() + (today + 1) * SECONDS_PER_DAY;
        if old_today != today {
            info!(today, day_cutoff = self.sched.day_cutoff, "Study day changed");
        }
        self.decks.roll_over(today);
        if self.conf.last_unburied < today {
            self.unbury_all()?;
        }
        Ok(())
    }

    /// The next card to study, or `None` when nothing is due
    ///
    /// Learning cards due now come first, then new cards when the spread
    /// setting asks for one, then reviews, day-learning cards, any remaining
    /// new cards, and finally learning cards due within the collapse window.
    ///
    /// ### Errors
    ///
    /// Returns a storage error if the queues cannot be filled
    #[instrument(skip(self))]
    pub fn pop_card(&mut self) -> SchedResult<Option<Card>> {
        self.transact(|col| {
            col.refresh_inner()?;
            let Some(mut card) = col.next_card()? else {
                debug!("Nothing left to study");
                return Ok(None);
            };
            debug!(card_id = card.id, queue = ?card.queue, "Popped card");
            if !col.sched_config.bury_siblings_on_answer {
                col.bury_siblings(&card)?;
            }
            col.sched.reps += 1;
            card.start_timer(col.now_millis());
            Ok(Some(card))
        })
    }

    fn next_card(&mut self) -> SchedResult<Option<Card>> {
        if let Some(card) = self.get_lrn_card(false)? {
            return Ok(Some(card));
        }
        if self.time_for_new_card() {
            if let Some(card) = self.get_new_card()? {
                return Ok(Some(card));
            }
        }
        if let Some(card) = self.get_rev_card()? {
            return Ok(Some(card));
        }
        if let Some(card) = self.get_lrn_day_card()? {
            return Ok(Some(card));
        }
        if let Some(card) = self.get_new_card()? {
            return Ok(Some(card));
        }
        self.get_lrn_card(true)
    }

    /// Records an answer and reschedules the card
    ///
    /// ### Arguments
    ///
    /// * `card` - The card being answered, as returned by [`Collection::pop_card`];
    ///   updated in place on success
    /// * `grade` - The answer given
    ///
    /// ### Errors
    ///
    /// Returns `InvalidQueue` if the card is suspended or buried, or a
    /// storage error; on error neither the card nor the store is changed
    #[instrument(skip(self, card), fields(card_id = card.id, grade = ?grade))]
    pub fn answer_card(&mut self, card: &mut Card, grade: Grade) -> SchedResult<()> {
        if !card.queue.is_active() {
            return Err(SchedError::InvalidQueue(card.id));
        }
        let mut working = card.clone();
        self.transact(|col| col.answer_card_inner(&mut working, grade))?;
        *card = working;
        Ok(())
    }

    fn answer_card_inner(&mut self, card: &mut Card, grade: Grade) -> SchedResult<()> {
        if self.sched_config.bury_siblings_on_answer {
            self.bury_siblings(card)?;
        }
        card.reps += 1;
        let was_new = card.ctype == CardType::New;
        let from_new_queue = card.queue == Queue::New;
        let conf = self.card_config(card);

        if from_new_queue {
            card.queue = Queue::Learning;
            if card.ctype == CardType::New {
                card.ctype = CardType::Learning;
            }
            card.left = self.starting_left(card, &conf);
            if card.in_filtered_deck() && card.ctype == CardType::Review && conf.resched {
                card.ivl = self.dyn_ivl_boost(card, &conf);
                card.odue = self.sched.today + i64::from(card.ivl);
            }
            self.update_stats(card.did, StatKind::New, 1)?;
        }

        match card.queue {
            Queue::Learning | Queue::DayLearning => {
                self.answer_learn_card(card, grade, &conf, was_new)?;
                if !from_new_queue {
                    self.update_stats(card.did, StatKind::Learning, 1)?;
                }
            }
            Queue::Review => {
                self.answer_rev_card(card, grade, &conf)?;
                self.update_stats(card.did, StatKind::Review, 1)?;
            }
            _ => return Err(SchedError::InvalidQueue(card.id)),
        }

        let taken = card.time_taken(self.now_millis(), conf.max_taken);
        self.update_stats(card.did, StatKind::Time, taken)?;
        card.mtime = self.now_secs();
        card.usn = self.usn();
        self.store.save_card(card)?;
        Ok(())
    }

    /// Adds to today's counters of a deck and all of its parents
    pub(crate) fn update_stats(&mut self, deck_id: DeckId, kind: StatKind, delta: i64) -> SchedResult<()> {
        let today = self.sched.today;
        let stamp = self.stamp();
        let mut chain = vec![deck_id];
        chain.extend(self.decks.parent_ids(deck_id));
        for did in chain {
            if !self.decks.contains(did) {
                continue;
            }
            self.decks.update_deck(did, stamp, |deck| {
                let counter = match kind {
                    StatKind::New => &mut deck.new_today,
                    StatKind::Learning => &mut deck.lrn_today,
                    StatKind::Review => &mut deck.rev_today,
                    StatKind::Time => &mut deck.time_today,
                };
                counter.add(today, delta);
            })?;
        }
        Ok(())
    }

    /// Writes a review log entry for an answer
    pub(crate) fn log_answer(
        &mut self,
        card: &Card,
        grade: Grade,
        ivl: i64,
        last_ivl: i64,
        review_type: ReviewType,
        max_taken: u32,
    ) -> SchedResult<()> {
        let entry = ReviewLogEntry {
            id: self.next_revlog_id(),
            cid: card.id,
            usn: self.usn(),
            ease: grade,
            ivl,
            last_ivl,
            factor: card.factor,
            time: card.time_taken(self.now_millis(), max_taken),
            review_type,
        };
        let id = self.store.append_review_log(&entry)?;
        self.note_revlog_id(id);
        Ok(())
    }

    /// Scheduling options for a card
    pub(crate) fn card_config(&self, card: &Card) -> CardConfig {
        let home = self.decks.config_for_deck(card.home_deck());
        let mut conf = CardConfig {
            new: home.new,
            lapse: home.lapse,
            rev: home.rev,
            max_taken: home.max_taken,
            resched: true,
            filtered: false,
        };
        if let Some(filtered) = self.decks.get(card.did).and_then(Deck::filtered) {
            conf.filtered = true;
            conf.resched = filtered.resched;
            if let Some(delays) = filtered.delays.as_ref().filter(|d| !d.is_empty()) {
                conf.new.delays = delays.clone();
                conf.lapse.delays = delays.clone();
            }
            conf.new.order = NewCardOrder::Due;
            conf.new.per_day = u32::try_from(self.sched_config.report_limit).unwrap_or(u32::MAX);
        }
        conf
    }

    /// Current counts; a card in hand is added back to its own bucket
    pub fn counts(&self, card: Option<&Card>) -> Counts {
        let mut counts = Counts {
            new: self.sched.new_count,
            learning: self.sched.lrn_count,
            review: self.sched.rev_count,
        };
        if let Some(card) = card {
            match card.queue {
                Queue::New => counts.new += 1,
                Queue::Learning => counts.learning += card.steps_remaining_today() as usize,
                Queue::DayLearning => counts.learning += 1,
                Queue::Review => counts.review += 1,
                Queue::Buried | Queue::Suspended => {}
            }
        }
        counts
    }

    /// Which bucket of [`Counts`] a card belongs to: 0 new, 1 learning, 2 review
    pub fn count_index(&self, card: &Card) -> Option<usize> {
        match card.queue {
            Queue::New => Some(0),
            Queue::Learning | Queue::DayLearning => Some(1),
            Queue::Review => Some(2),
            Queue::Buried | Queue::Suspended => None,
        }
    }

    /// Number of answer buttons to offer for a card
    pub fn answer_buttons(&self, card: &Card) -> u8 {
        if card.odue != 0 {
            if card.in_filtered_deck() && card.queue == Queue::Review {
                return 4;
            }
            let conf = self.card_config(card);
            if matches!(card.ctype, CardType::New | CardType::Learning)
                || conf.learn_delays(card.ctype).len() > 1
            {
                return 3;
            }
            return 2;
        }
        if card.queue == Queue::Review { 4 } else { 3 }
    }

    /// Seconds until the card would next be due if answered with `grade`
    ///
    /// The card is not changed and no fuzz is applied.
    pub fn next_interval(&self, card: &Card, grade: Grade) -> i64 {
        let conf = self.card_config(card);
        match card.queue {
            Queue::New | Queue::Learning | Queue::DayLearning => self.next_learn_interval(card, grade, &conf),
            _ if grade == Grade::Again => {
                if !conf.lapse.delays.is_empty() {
                    intervals::delay_for_step(&conf.lapse.delays, conf.lapse.delays.len() as u32)
                } else {
                    i64::from(intervals::next_lapse_ivl(card.ivl, &conf.lapse)) * SECONDS_PER_DAY
                }
            }
            _ => i64::from(self.next_rev_ivl(card, grade, &conf)) * SECONDS_PER_DAY,
        }
    }

    // ---- limits ----

    /// A deck's own remaining allowance, ignoring its parents
    pub(crate) fn deck_limit_single(&self, deck: &Deck, kind: LimitKind) -> i64 {
        if deck.is_filtered() {
            return self.sched_config.report_limit as i64;
        }
        let conf = self.decks.config_for_deck(deck.id);
        let today = self.sched.today;
        let (per_day, done) = match kind {
            LimitKind::New => (conf.new.per_day, deck.new_today.on(today)),
            LimitKind::Review => (conf.rev.per_day, deck.rev_today.on(today)),
        };
        (i64::from(per_day) - done).max(0)
    }

    /// Remaining allowance of a deck, bounded by every ancestor
    pub(crate) fn deck_limit(&self, deck_id: DeckId, kind: LimitKind) -> i64 {
        let Some(deck) = self.decks.get(deck_id) else {
            return 0;
        };
        let mut limit = self.deck_limit_single(deck, kind);
        for parent in self.decks.parents(deck_id) {
            limit = limit.min(self.deck_limit_single(parent, kind));
        }
        limit
    }

    fn count_up_to(&mut self, deck_id: DeckId, kind: LimitKind, limit: usize) -> SchedResult<usize> {
        let filter = match kind {
            LimitKind::New => CardFilter::new().deck(deck_id).queue(Queue::New),
            LimitKind::Review => CardFilter::new()
                .deck(deck_id)
                .queue(Queue::Review)
                .due(DueBound::AtOrBefore(self.sched.today)),
        };
        Ok(self.store.count_cards(&filter, Some(limit))?)
    }

    /// Total cards available across the active decks
    ///
    /// Decks are visited in active order. Each deck's limit is clamped by
    /// the allowance its ancestors still have, and whatever it uses is taken
    /// off those ancestors.
    pub(crate) fn walking_count(&mut self, kind: LimitKind) -> SchedResult<usize> {
        let mut total = 0usize;
        let mut remaining: HashMap<DeckId, i64> = HashMap::new();
        for deck_id in self.conf.active_decks.clone() {
            let Some(deck) = self.decks.get(deck_id) else {
                continue;
            };
            let mut limit = self.deck_limit_single(deck, kind);
            if limit <= 0 {
                continue;
            }
            let parents = self.decks.parent_ids(deck_id);
            for parent in &parents {
                let parent_left = match remaining.get(parent) {
                    Some(left) => *left,
                    None => {
                        let left = self.decks.get(*parent).map_or(0, |p| self.deck_limit_single(p, kind));
                        remaining.insert(*parent, left);
                        left
                    }
                };
                limit = limit.min(parent_left);
            }
            let count = if limit > 0 { self.count_up_to(deck_id, kind, limit as usize)? } else { 0 };
            for parent in &parents {
                if let Some(left) = remaining.get_mut(parent) {
                    *left -= count as i64;
                }
            }
            remaining.insert(deck_id, limit - count as i64);
            total += count;
        }
        Ok(total)
    }

    /// Raises today's limits of the current deck, its parents and children
    #[instrument(skip(self))]
    pub fn extend_limits(&mut self, new: i64, rev: i64) -> SchedResult<()> {
        self.transact(|col| {
            let current = col.current_deck_id();
            let today = col.sched.today;
            let stamp = col.stamp();
            let mut targets = vec![current];
            targets.extend(col.decks.parent_ids(current));
            targets.extend(col.decks.child_ids(current));
            for did in targets {
                col.decks.update_deck(did, stamp, |deck| {
                    deck.new_today.add(today, -new);
                    deck.rev_today.add(today, -rev);
                })?;
            }
            col.sched.invalidate();
            Ok(())
        })
    }

    /// New cards in the active decks, up to the report limit
    pub fn total_new_for_current_deck(&mut self) -> SchedResult<usize> {
        let filter = CardFilter::new().decks(&self.conf.active_decks).queue(Queue::New);
        Ok(self.store.count_cards(&filter, Some(self.sched_config.report_limit))?)
    }

    /// Reviews due in the active decks, up to the report limit
    pub fn total_review_for_current_deck(&mut self) -> SchedResult<usize> {
        let filter = CardFilter::new()
            .decks(&self.conf.active_decks)
            .queue(Queue::Review)
            .due(DueBound::AtOrBefore(self.sched.today));
        Ok(self.store.count_cards(&filter, Some(self.sched_config.report_limit))?)
    }
}
