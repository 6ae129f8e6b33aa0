//! Card search
//!
//! A compact query language over cards, their notes and decks. It backs
//! filtered decks and the search endpoint. See [`parser`] for the syntax.

mod matcher;
pub mod parser;

pub use parser::{Comparison, Node, Property, SearchTerm, StateKind, parse};

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, instrument};

use crate::collection::Collection;
use crate::errors::SchedResult;
use crate::models::{Card, CardId, Note, NoteId};
use crate::repo::{CardOrder, Store};
use matcher::{DeckScope, MatchContext, compile};

impl<S: Store> Collection<S> {
    /// Ids of the cards matching a search, in ascending id order
    ///
    /// ### Errors
    ///
    /// Returns `InvalidSearch` if the search cannot be parsed
    #[instrument(skip(self))]
    pub fn search_cards(&mut self, query: &str) -> SchedResult<Vec<CardId>> {
        Ok(self.find_cards(query)?.into_iter().map(|c| c.id).collect())
    }

    /// Cards matching a search, in ascending id order
    ///
    /// Terms every match must satisfy (ids, decks, queues and types) narrow
    /// the store query; the rest are checked on the loaded cards.
    pub(crate) fn find_cards(&mut self, query: &str) -> SchedResult<Vec<Card>> {
        let node = parse(query)?;
        let scope = DeckScope { current_deck: self.current_deck_id(), decks: &self.decks };
        let compiled = compile(&node, &scope)?;

        let cards = self.store.query_cards(&compiled.prefilter(), CardOrder::Id, None)?;
        let note_ids: Vec<NoteId> = cards.iter().map(|c| c.nid).collect::<BTreeSet<_>>().into_iter().collect();
        let notes: HashMap<NoteId, Note> =
            self.store.get_notes(&note_ids)?.into_iter().map(|n| (n.id, n)).collect();

        let ctx = MatchContext { today: self.sched.today, day_cutoff: self.sched.day_cutoff, notes: &notes };
        let loaded = cards.len();
        let found: Vec<Card> = cards.into_iter().filter(|card| compiled.matches(card, &ctx)).collect();
        debug!(loaded, found = found.len(), "Search finished");
        Ok(found)
    }
}
