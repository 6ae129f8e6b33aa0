//! Filtered decks
//!
//! A filtered deck borrows cards from their home decks. While borrowed a
//! card remembers its home deck in `odid` and its original due in `odue`;
//! emptying the deck puts both back.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};

use crate::collection::Collection;
use crate::errors::{SchedError, SchedResult};
use crate::models::{Card, CardId, CardType, DEFAULT_DECK_ID, DeckId, DynOrder, FilterTerm, Queue};
use crate::repo::{CardFilter, CardOrder, Store};

/// Due given to the first card moved into a filtered deck; later cards count up from here
const FILTERED_DUE_BASE: i64 = -100_000;

impl<S: Store> Collection<S> {
    /// Empties a filtered deck and fills it again from its search terms
    ///
    /// Suspended, buried and learning cards are skipped, as are cards already
    /// in a filtered deck. A search that does not parse matches nothing. The
    /// deck is selected when it ends up with cards.
    ///
    /// ### Returns
    ///
    /// The number of cards moved into the deck
    ///
    /// ### Errors
    ///
    /// Returns `NotFiltered` if the deck is missing or is a normal deck
    #[instrument(skip(self))]
    pub fn rebuild_filtered(&mut self, deck_id: DeckId) -> SchedResult<usize> {
        let terms = match self.decks.get(deck_id).and_then(|d| d.filtered()) {
            Some(filtered) => filtered.terms.clone(),
            None => return Err(SchedError::NotFiltered(deck_id)),
        };
        self.transact(|col| {
            col.empty_filtered_inner(deck_id)?;

            let mut chosen: Vec<Card> = Vec::new();
            let mut seen: HashSet<CardId> = HashSet::new();
            for term in &terms {
                let mut found: Vec<Card> = col
                    .gather_for_term(term)?
                    .into_iter()
                    .filter(|c| !seen.contains(&c.id))
                    .collect();
                col.order_for_filtered(&mut found, term.order)?;
                found.truncate(term.limit as usize);
                seen.extend(found.iter().map(|c| c.id));
                chosen.extend(found);
            }

            let moved = chosen.len();
            col.move_to_filtered(deck_id, chosen)?;
            if moved > 0 {
                col.select_deck(deck_id)?;
            }
            col.sched.invalidate();
            info!(deck_id, cards = moved, "Rebuilt filtered deck");
            Ok(moved)
        })
    }

    fn gather_for_term(&mut self, term: &FilterTerm) -> SchedResult<Vec<Card>> {
        let search = term.search.trim();
        let exclusions = "-is:suspended -is:buried -deck:filtered -is:learn";
        let query = if search.is_empty() { exclusions.to_string() } else { format!("({}) {}", search, exclusions) };
        match self.find_cards(&query) {
            Ok(cards) => Ok(cards),
            Err(SchedError::InvalidSearch(reason)) => {
                warn!(search, reason = %reason, "Filtered deck search is invalid, matching nothing");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Sorts gathered cards into the order a filtered deck asks for
    ///
    /// Cards arrive in id order, which also breaks ties.
    fn order_for_filtered(&mut self, cards: &mut [Card], order: DynOrder) -> SchedResult<()> {
        let today = self.sched.today;
        match order {
            DynOrder::Oldest => {
                let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
                let last: HashMap<CardId, i64> = self.store.last_review_ids(&ids)?;
                cards.sort_by_key(|c| last.get(&c.id).copied());
            }
            DynOrder::Random => cards.shuffle(&mut self.rng),
            DynOrder::SmallestInterval => cards.sort_by_key(|c| c.ivl),
            DynOrder::LargestInterval => cards.sort_by_key(|c| Reverse(c.ivl)),
            DynOrder::MostLapses => cards.sort_by_key(|c| Reverse(c.lapses)),
            DynOrder::Added => cards.sort_by_key(|c| c.nid),
            DynOrder::ReverseAdded => cards.sort_by_key(|c| Reverse(c.nid)),
            DynOrder::Due => cards.sort_by_key(|c| c.due),
            DynOrder::DuePriority => cards.sort_by(|a, b| due_priority(a, today).total_cmp(&due_priority(b, today))),
        }
        Ok(())
    }

    /// Relocates cards into a filtered deck, keeping their given order
    ///
    /// Reviews that are due stay in the review queue; everything else is
    /// studied from the new queue.
    fn move_to_filtered(&mut self, deck_id: DeckId, cards: Vec<Card>) -> SchedResult<()> {
        let today = self.sched.today;
        let now = self.now_secs();
        let usn = self.usn();
        for (i, mut card) in cards.into_iter().enumerate() {
            if card.odid == 0 {
                card.odid = card.did;
            }
            if card.odue == 0 {
                card.odue = card.due;
            }
            let home_due = card.odue;
            card.queue = if card.ctype == CardType::Review && home_due <= today { Queue::Review } else { Queue::New };
            card.did = deck_id;
            card.due = FILTERED_DUE_BASE + i as i64;
            card.mtime = now;
            card.usn = usn;
            self.store.save_card(&card)?;
        }
        Ok(())
    }

    /// Returns every card of a filtered deck to its home deck
    #[instrument(skip(self))]
    pub fn empty_filtered(&mut self, deck_id: DeckId) -> SchedResult<usize> {
        if !self.decks.is_filtered(deck_id) {
            return Err(SchedError::NotFiltered(deck_id));
        }
        self.transact(|col| col.empty_filtered_inner(deck_id))
    }

    fn empty_filtered_inner(&mut self, deck_id: DeckId) -> SchedResult<usize> {
        let cards = self.store.query_cards(&CardFilter::new().deck(deck_id), CardOrder::Id, None)?;
        let count = self.return_home(cards)?;
        if count > 0 {
            debug!(deck_id, cards = count, "Emptied filtered deck");
        }
        self.sched.invalidate();
        Ok(count)
    }

    /// Returns the given cards home if they sit in a filtered deck
    pub(crate) fn remove_from_filtered(&mut self, card_ids: &[CardId]) -> SchedResult<()> {
        let filter = CardFilter::new().ids(card_ids).in_filtered_deck(true);
        let cards = self.store.query_cards(&filter, CardOrder::Id, None)?;
        if self.return_home(cards)? > 0 {
            self.sched.invalidate();
        }
        Ok(())
    }

    fn return_home(&mut self, cards: Vec<Card>) -> SchedResult<usize> {
        let now = self.now_secs();
        let usn = self.usn();
        let count = cards.len();
        for mut card in cards {
            card.did = if card.odid != 0 { card.odid } else { DEFAULT_DECK_ID };
            if card.ctype == CardType::Learning {
                card.ctype = CardType::New;
            }
            card.queue = card.ctype.home_queue();
            if card.odue != 0 {
                card.due = card.odue;
            }
            card.odue = 0;
            card.odid = 0;
            card.mtime = now;
            card.usn = usn;
            self.store.save_card(&card)?;
        }
        Ok(count)
    }
}

/// Sort key favouring due reviews with a short interval relative to how
/// overdue they are; everything else follows in due order
fn due_priority(card: &Card, today: i64) -> f64 {
    if card.queue == Queue::Review && card.due <= today {
        f64::from(card.ivl) / ((today - card.due) as f64 + 0.001)
    } else {
        100_000.0 + card.due as f64
    }
}
