use std::cmp::Reverse;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::CardConfig;
use super::intervals::{self, delay_for_step, left_today};
use crate::clock::SECONDS_PER_DAY;
use crate::collection::Collection;
use crate::errors::SchedResult;
use crate::models::{Card, CardType, Grade, Queue, ReviewType};
use crate::repo::{CardFilter, CardOrder, DueBound, Store};

impl<S: Store> Collection<S> {
    pub(crate) fn reset_lrn(&mut self) -> SchedResult<()> {
        let active = self.conf.active_decks.clone();
        let limit = Some(self.sched_config.report_limit);
        let intraday = CardFilter::new()
            .decks(&active)
            .queue(Queue::Learning)
            .due(DueBound::Before(self.sched.day_cutoff));
        let steps: usize = self
            .store
            .query_cards(&intraday, CardOrder::Unordered, limit)?
            .iter()
            .map(|c| c.steps_remaining_today() as usize)
            .sum();
        let interday = CardFilter::new()
            .decks(&active)
            .queue(Queue::DayLearning)
            .due(DueBound::AtOrBefore(self.sched.today));
        let days = self.store.count_cards(&interday, limit)?;

        self.sched.lrn_count = steps + days;
        self.sched.lrn_queue.clear();
        self.sched.lrn_day_queue.clear();
        self.sched.lrn_dids = active.into_iter().collect();
        Ok(())
    }

    fn fill_lrn(&mut self) -> SchedResult<bool> {
        if self.sched.lrn_count == 0 {
            return Ok(false);
        }
        if !self.sched.lrn_queue.is_empty() {
            return Ok(true);
        }
        let filter = CardFilter::new()
            .decks(&self.conf.active_decks)
            .queue(Queue::Learning)
            .due(DueBound::Before(self.sched.day_cutoff));
        let cards = self.store.query_cards(&filter, CardOrder::Due, Some(self.sched_config.report_limit))?;
        self.sched.lrn_queue = cards.into_iter().map(|c| Reverse((c.due, c.id))).collect();
        Ok(!self.sched.lrn_queue.is_empty())
    }

    /// The learning card due soonest, if it is due before now, or before
    /// now plus the collapse time when `collapse` is set
    pub(crate) fn get_lrn_card(&mut self, collapse: bool) -> SchedResult<Option<Card>> {
        if !self.fill_lrn()? {
            return Ok(None);
        }
        let mut cutoff = self.now_secs();
        if collapse {
            cutoff += self.conf.collapse_time;
        }
        match self.sched.lrn_queue.peek() {
            Some(Reverse((due, _))) if *due < cutoff => {}
            _ => return Ok(None),
        }
        let Some(Reverse((_, card_id))) = self.sched.lrn_queue.pop() else {
            return Ok(None);
        };
        let card = self.get_card(card_id)?;
        self.sched.lrn_count = self.sched.lrn_count.saturating_sub(card.steps_remaining_today() as usize);
        Ok(Some(card))
    }

    fn fill_lrn_day(&mut self) -> SchedResult<bool> {
        if self.sched.lrn_count == 0 {
            return Ok(false);
        }
        if !self.sched.lrn_day_queue.is_empty() {
            return Ok(true);
        }
        let queue_limit = self.sched_config.queue_limit;
        while let Some(&deck_id) = self.sched.lrn_dids.front() {
            let filter = CardFilter::new()
                .deck(deck_id)
                .queue(Queue::DayLearning)
                .due(DueBound::AtOrBefore(self.sched.today));
            let mut ids = self.store.query_card_ids(&filter, CardOrder::Id, Some(queue_limit))?;
            if !ids.is_empty() {
                let mut rng = StdRng::seed_from_u64(self.sched.today as u64);
                ids.shuffle(&mut rng);
                if ids.len() < queue_limit {
                    self.sched.lrn_dids.pop_front();
                }
                debug!(deck_id, cards = ids.len(), "Filled day-learning queue");
                self.sched.lrn_day_queue = ids;
                return Ok(true);
            }
            self.sched.lrn_dids.pop_front();
        }
        Ok(false)
    }

    pub(crate) fn get_lrn_day_card(&mut self) -> SchedResult<Option<Card>> {
        if !self.fill_lrn_day()? {
            return Ok(None);
        }
        let Some(card_id) = self.sched.lrn_day_queue.pop() else {
            return Ok(None);
        };
        self.sched.lrn_count = self.sched.lrn_count.saturating_sub(1);
        self.get_card(card_id).map(Some)
    }

    pub(crate) fn starting_left(&self, card: &Card, conf: &CardConfig) -> u32 {
        intervals::starting_left(conf.learn_delays(card.ctype), self.now_secs(), self.sched.day_cutoff)
    }

    pub(crate) fn dyn_ivl_boost(&self, card: &Card, conf: &CardConfig) -> u32 {
        intervals::dyn_ivl_boost(card.ivl, card.factor, card.odue, self.sched.today, conf.rev.max_ivl)
    }

    /// Handles an answer on a card in the learning or day-learning queue
    pub(crate) fn answer_learn_card(
        &mut self,
        card: &mut Card,
        grade: Grade,
        conf: &CardConfig,
        was_new: bool,
    ) -> SchedResult<()> {
        let review_type = if card.in_filtered_deck() && !was_new {
            ReviewType::Cram
        } else if card.ctype == CardType::Review {
            ReviewType::Relearn
        } else {
            ReviewType::Learn
        };
        let last_left = card.left;
        let delays = conf.learn_delays(card.ctype).to_vec();
        let on_last_step = card.steps_remaining() <= 1;

        let graduated = match grade {
            Grade::Easy => {
                self.reschedule_as_rev(card, conf, true);
                true
            }
            Grade::Good | Grade::Hard if on_last_step => {
                self.reschedule_as_rev(card, conf, false);
                true
            }
            Grade::Good => {
                let left = card.steps_remaining() - 1;
                card.left = left_today(&delays, left, self.now_secs(), self.sched.day_cutoff) * 1000 + left;
                false
            }
            Grade::Hard => false,
            Grade::Again => {
                card.left = self.starting_left(card, conf);
                if conf.resched && card.ctype == CardType::Review {
                    let shrunk = (f64::from(card.ivl) * conf.lapse.mult) as u32;
                    card.ivl = 1.max(conf.lapse.min_int).max(shrunk);
                }
                if conf.resched && card.in_filtered_deck() {
                    card.odue = self.sched.today + 1;
                }
                false
            }
        };

        if !graduated {
            self.schedule_next_step(card, &delays);
        }

        let last_ivl = -delay_for_step(&delays, last_left);
        let ivl = if graduated { i64::from(card.ivl) } else { -delay_for_step(&delays, card.left) };
        self.log_answer(card, grade, ivl, last_ivl, review_type, conf.max_taken)
    }

    /// Sets the due time for the step `card.left` points at, and queues the
    /// card for later today or for a later day
    fn schedule_next_step(&mut self, card: &mut Card, delays: &[f32]) {
        let now = self.now_secs();
        let mut delay = delay_for_step(delays, card.left);
        let jitter = self.sched_config.learn_jitter;
        if card.due < now && jitter > 1.0 {
            delay = (delay as f64 * self.rng.random_range(1.0..jitter)) as i64;
        }
        card.due = now + delay;

        if card.due < self.sched.day_cutoff {
            self.sched.lrn_count += card.steps_remaining_today() as usize;
            card.queue = Queue::Learning;
            let nothing_else = self.sched.rev_count == 0 && self.sched.new_count == 0;
            if nothing_else {
                if let Some(Reverse((soonest, _))) = self.sched.lrn_queue.peek() {
                    card.due = card.due.max(soonest + 1);
                }
            }
            self.sched.lrn_queue.push(Reverse((card.due, card.id)));
        } else {
            card.due = intervals::day_learn_due(card.due, self.sched.day_cutoff, self.sched.today);
            card.queue = Queue::DayLearning;
        }
    }

    /// Moves a card that finished its steps into the review queue
    fn reschedule_as_rev(&mut self, card: &mut Card, conf: &CardConfig, early: bool) {
        let lapse = card.ctype == CardType::Review;
        if lapse {
            card.due = if conf.resched { (self.sched.today + 1).max(card.odue) } else { card.odue };
            card.odue = 0;
        } else {
            card.ivl = self.graduating_ivl(card, conf, early, true);
            card.due = self.sched.today + i64::from(card.ivl);
            card.factor = conf.new.initial_factor;
        }
        card.queue = Queue::Review;
        card.ctype = CardType::Review;

        if card.in_filtered_deck() {
            card.did = card.odid;
            card.odue = 0;
            card.odid = 0;
            if !conf.resched && !lapse {
                card.queue = Queue::New;
                card.ctype = CardType::New;
                card.due = self.next_position();
            }
        }
    }

    /// Interval given to a card leaving learning
    ///
    /// ### Arguments
    ///
    /// * `early` - Graduating with Easy; uses the second graduating interval
    /// * `fuzz` - Whether to fuzz new-card intervals
    fn graduating_ivl(&mut self, card: &Card, conf: &CardConfig, early: bool, fuzz: bool) -> u32 {
        if card.ctype == CardType::Review {
            if card.in_filtered_deck() && conf.resched {
                return self.dyn_ivl_boost(card, conf);
            }
            return card.ivl;
        }
        let ideal = graduating_ideal(conf, early);
        if fuzz { self.fuzzed_ivl(ideal) } else { ideal }
    }

    /// Picks a random interval from the fuzz range of `ivl`
    pub(crate) fn fuzzed_ivl(&mut self, ivl: u32) -> u32 {
        let (low, high) = intervals::fuzz_ivl_range(ivl);
        self.rng.random_range(low..=high)
    }

    /// Seconds until a learning (or new) card would next be shown
    pub(crate) fn next_learn_interval(&self, card: &Card, grade: Grade, conf: &CardConfig) -> i64 {
        let delays = conf.learn_delays(card.ctype);
        let left = if card.queue == Queue::New { self.starting_left(card, conf) } else { card.left };
        let graduating = |early: bool| -> i64 {
            let days = if card.ctype == CardType::Review {
                if card.in_filtered_deck() && conf.resched { self.dyn_ivl_boost(card, conf) } else { card.ivl }
            } else {
                graduating_ideal(conf, early)
            };
            i64::from(days) * SECONDS_PER_DAY
        };
        match grade {
            Grade::Again => delay_for_step(delays, delays.len() as u32),
            Grade::Easy => graduating(true),
            Grade::Good | Grade::Hard if left % 1000 <= 1 => graduating(false),
            Grade::Good => delay_for_step(delays, left % 1000 - 1),
            Grade::Hard => delay_for_step(delays, left),
        }
    }
}

fn graduating_ideal(conf: &CardConfig, early: bool) -> u32 {
    let idx = usize::from(early);
    conf.new.ints.get(idx).copied().unwrap_or(1).max(1)
}
