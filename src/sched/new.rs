use tracing::debug;

use super::LimitKind;
use crate::collection::Collection;
use crate::errors::SchedResult;
use crate::models::{Card, NewSpread, Queue};
use crate::repo::{CardFilter, CardOrder, Store};

impl<S: Store> Collection<S> {
    pub(crate) fn reset_new(&mut self) -> SchedResult<()> {
        self.sched.new_count = self.walking_count(LimitKind::New)?;
        self.sched.new_dids = self.conf.active_decks.iter().copied().collect();
        self.sched.new_queue.clear();
        self.update_new_card_ratio();
        Ok(())
    }

    /// Refills the new queue from the first active deck that still has cards
    ///
    /// If every deck is used up while the count says cards remain (they were
    /// buried or removed after counting), the new state is rebuilt once and
    /// the fill retried.
    fn fill_new(&mut self) -> SchedResult<bool> {
        for attempt in 0..2 {
            if !self.sched.new_queue.is_empty() {
                return Ok(true);
            }
            if self.sched.new_count == 0 {
                return Ok(false);
            }
            while let Some(&deck_id) = self.sched.new_dids.front() {
                let limit = self.deck_limit(deck_id, LimitKind::New).min(self.sched_config.queue_limit as i64);
                if limit > 0 {
                    let filter = CardFilter::new().deck(deck_id).queue(Queue::New);
                    let mut ids = self.store.query_card_ids(&filter, CardOrder::Due, Some(limit as usize))?;
                    if !ids.is_empty() {
                        ids.reverse();
                        debug!(deck_id, cards = ids.len(), "Filled new queue");
                        self.sched.new_queue = ids;
                        return Ok(true);
                    }
                }
                self.sched.new_dids.pop_front();
            }
            if attempt == 0 {
                debug!(count = self.sched.new_count, "New queue drained early, recounting");
                self.reset_new()?;
            }
        }
        Ok(false)
    }

    pub(crate) fn get_new_card(&mut self) -> SchedResult<Option<Card>> {
        if !self.fill_new()? {
            return Ok(None);
        }
        let Some(card_id) = self.sched.new_queue.pop() else {
            return Ok(None);
        };
        self.sched.new_count = self.sched.new_count.saturating_sub(1);
        self.get_card(card_id).map(Some)
    }

    fn update_new_card_ratio(&mut self) {
        let new = self.sched.new_count;
        let rev = self.sched.rev_count;
        self.sched.new_card_modulus = if self.conf.new_spread == NewSpread::Distribute && new > 0 {
            let modulus = ((new + rev) as f64 / new as f64).round() as usize;
            if rev > 0 { modulus.max(2) } else { modulus }
        } else {
            0
        };
    }

    /// True if the spread setting wants a new card shown now
    pub(crate) fn time_for_new_card(&self) -> bool {
        if self.sched.new_count == 0 {
            return false;
        }
        match self.conf.new_spread {
            NewSpread::Last => false,
            NewSpread::First => true,
            NewSpread::Distribute => {
                let modulus = self.sched.new_card_modulus as u32;
                modulus > 0 && self.sched.reps > 0 && self.sched.reps % modulus == 0
            }
        }
    }
}
