use std::cmp::Reverse;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::intervals::{self, adjusted_factor, delay_for_step, review_intervals};
use super::{CardConfig, LimitKind};
use crate::collection::Collection;
use crate::errors::SchedResult;
use crate::models::{Card, Grade, LeechAction, Queue, ReviewType};
use crate::repo::{CardFilter, CardOrder, DueBound, Store};

impl<S: Store> Collection<S> {
    pub(crate) fn reset_rev(&mut self) -> SchedResult<()> {
        self.sched.rev_count = self.walking_count(LimitKind::Review)?;
        self.sched.rev_queue.clear();
        self.sched.rev_dids = self.conf.active_decks.iter().copied().collect();
        Ok(())
    }

    /// Refills the review queue from the first active deck with due reviews
    ///
    /// Normal decks are shuffled with a seed fixed for the day; filtered
    /// decks keep their due order. Like the new queue, a drained deck list
    /// with a non-zero count triggers one recount and retry.
    fn fill_rev(&mut self) -> SchedResult<bool> {
        for attempt in 0..2 {
            if !self.sched.rev_queue.is_empty() {
                return Ok(true);
            }
            if self.sched.rev_count == 0 {
                return Ok(false);
            }
            while let Some(&deck_id) = self.sched.rev_dids.front() {
                let limit = self.deck_limit(deck_id, LimitKind::Review).min(self.sched_config.queue_limit as i64);
                if limit > 0 {
                    let filtered = self.decks.is_filtered(deck_id);
                    let filter = CardFilter::new()
                        .deck(deck_id)
                        .queue(Queue::Review)
                        .due(DueBound::AtOrBefore(self.sched.today));
                    let order = if filtered { CardOrder::Due } else { CardOrder::Id };
                    let mut ids = self.store.query_card_ids(&filter, order, Some(limit as usize))?;
                    if !ids.is_empty() {
                        if filtered {
                            ids.reverse();
                        } else {
                            let mut rng = StdRng::seed_from_u64(self.sched.today as u64);
                            ids.shuffle(&mut rng);
                        }
                        if (ids.len() as i64) < limit {
                            self.sched.rev_dids.pop_front();
                        }
                        debug!(deck_id, cards = ids.len(), "Filled review queue");
                        self.sched.rev_queue = ids;
                        return Ok(true);
                    }
                }
                self.sched.rev_dids.pop_front();
            }
            if attempt == 0 {
                debug!(count = self.sched.rev_count, "Review queue drained early, recounting");
                self.reset_rev()?;
            }
        }
        Ok(false)
    }

    pub(crate) fn get_rev_card(&mut self) -> SchedResult<Option<Card>> {
        if !self.fill_rev()? {
            return Ok(None);
        }
        let Some(card_id) = self.sched.rev_queue.pop() else {
            return Ok(None);
        };
        self.sched.rev_count = self.sched.rev_count.saturating_sub(1);
        self.get_card(card_id).map(Some)
    }

    pub(crate) fn answer_rev_card(&mut self, card: &mut Card, grade: Grade, conf: &CardConfig) -> SchedResult<()> {
        let last_ivl = i64::from(card.ivl);
        let delay = if grade == Grade::Again {
            self.reschedule_lapse(card, conf)?
        } else {
            self.reschedule_rev(card, grade, conf);
            0
        };
        let ivl = if delay != 0 { -delay } else { i64::from(card.ivl) };
        self.log_answer(card, grade, ivl, last_ivl, ReviewType::Review, conf.max_taken)
    }

    /// Applies a failed review
    ///
    /// ### Returns
    ///
    /// The relearning delay in seconds, or 0 if the card does not relearn
    fn reschedule_lapse(&mut self, card: &mut Card, conf: &CardConfig) -> SchedResult<i64> {
        if conf.resched {
            card.lapses += 1;
            card.ivl = intervals::next_lapse_ivl(card.ivl, &conf.lapse);
            card.factor = adjusted_factor(card.factor, -200);
            card.due = self.sched.today + i64::from(card.ivl);
            if card.in_filtered_deck() {
                card.odue = card.due;
            }
        }

        if self.check_leech(card, conf)? && card.queue == Queue::Suspended {
            return Ok(0);
        }
        if conf.lapse.delays.is_empty() {
            return Ok(0);
        }

        if card.odue == 0 {
            card.odue = card.due;
        }
        let delay = delay_for_step(&conf.lapse.delays, 0);
        card.due = self.now_secs() + delay;
        card.left = self.starting_left(card, conf);
        if card.due < self.sched.day_cutoff {
            self.sched.lrn_count += card.steps_remaining_today() as usize;
            card.queue = Queue::Learning;
            self.sched.lrn_queue.push(Reverse((card.due, card.id)));
        } else {
            card.due = intervals::day_learn_due(card.due, self.sched.day_cutoff, self.sched.today);
            card.queue = Queue::DayLearning;
        }
        Ok(delay)
    }

    /// Applies a passed review
    fn reschedule_rev(&mut self, card: &mut Card, grade: Grade, conf: &CardConfig) {
        if conf.resched {
            let ideal = self.next_rev_ivl(card, grade, conf);
            let fuzzed = self.fuzzed_ivl(ideal);
            card.ivl = fuzzed.max(card.ivl + 1).min(conf.rev.max_ivl);
            let delta = match grade {
                Grade::Hard => -150,
                Grade::Easy => 150,
                _ => 0,
            };
            card.factor = adjusted_factor(card.factor, delta);
            card.due = self.sched.today + i64::from(card.ivl);
        } else {
            card.due = card.odue;
        }
        if card.in_filtered_deck() {
            card.did = card.odid;
            card.odid = 0;
            card.odue = 0;
        }
    }

    /// Unfuzzed next interval in days for a passed review
    pub(crate) fn next_rev_ivl(&self, card: &Card, grade: Grade, conf: &CardConfig) -> u32 {
        let due = if card.in_filtered_deck() { card.odue } else { card.due };
        let days_late = (self.sched.today - due).max(0);
        let (hard, good, easy) = review_intervals(card.ivl, card.factor, days_late, &conf.rev);
        let ivl = match grade {
            Grade::Hard => hard,
            Grade::Easy => easy,
            _ => good,
        };
        ivl.min(conf.rev.max_ivl)
    }

    /// Tags a card's note as a leech once the lapse count calls for it, and
    /// suspends the card unless a leech listener objects
    ///
    /// ### Returns
    ///
    /// `true` if the card is a leech
    fn check_leech(&mut self, card: &mut Card, conf: &CardConfig) -> SchedResult<bool> {
        if !intervals::is_leech(card.lapses, conf.lapse.leech_fails) {
            return Ok(false);
        }
        if let Some(mut note) = self.store.get_note(card.nid)? {
            if note.add_tag("leech") {
                note.mtime = self.now_secs();
                note.usn = self.usn();
                self.store.save_note(&note)?;
            }
        }
        let allowed = self.hooks().run_leech(card);
        let suspend = allowed && conf.lapse.leech_action == LeechAction::Suspend;
        if suspend {
            if card.in_filtered_deck() {
                card.due = card.odue;
                card.did = card.odid;
            }
            card.odue = 0;
            card.odid = 0;
            card.queue = Queue::Suspended;
        }
        info!(card_id = card.id, lapses = card.lapses, suspended = suspend, "Card became a leech");
        Ok(true)
    }
}
