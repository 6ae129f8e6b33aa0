//! Due counts per deck, flat and as a tree

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::LimitKind;
use crate::collection::Collection;
use crate::decks::{basename_of, parent_of};
use crate::errors::SchedResult;
use crate::models::{DeckId, Queue};
use crate::repo::{CardFilter, CardOrder, DueBound, Store};

/// Due counts of one deck, not including its children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckDueEntry {
    pub name: String,
    pub deck_id: DeckId,
    pub review: usize,
    pub learn: usize,
    pub new: usize,
}

/// A deck with the counts of its whole subtree, clamped to its own limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckDueNode {
    /// Last component of the deck name
    pub name: String,
    pub deck_id: DeckId,
    pub review: usize,
    pub learn: usize,
    pub new: usize,
    pub collapsed: bool,
    pub children: Vec<DeckDueNode>,
}

enum Scan {
    Done(Vec<DeckDueEntry>),
    /// A deck was invalid and has been removed; the scan must start over
    Restart,
}

impl<S: Store> Collection<S> {
    /// Due counts for every deck, sorted by name
    ///
    /// New and review counts respect each deck's limits and those of its
    /// ancestors. A deck whose name duplicates an earlier one, or whose parent
    /// is missing, is removed (its cards go to the default deck) and the scan
    /// starts over.
    ///
    /// ### Errors
    ///
    /// Returns a storage error if counting or repairing fails
    #[instrument(skip(self))]
    pub fn deck_due_list(&mut self) -> SchedResult<Vec<DeckDueEntry>> {
        self.transact(|col| {
            if col.now_secs() > col.sched.day_cutoff {
                col.reset_inner()?;
            }
            let stamp = col.stamp();
            col.decks.check_integrity(stamp);

            let max_attempts = col.decks.all_ids().len() + 1;
            for _ in 0..max_attempts {
                if let Scan::Done(entries) = col.scan_due()? {
                    return Ok(entries);
                }
            }
            warn!(max_attempts, "Deck list still invalid after repairs");
            Ok(Vec::new())
        })
    }

    fn scan_due(&mut self) -> SchedResult<Scan> {
        let decks: Vec<(DeckId, String)> =
            self.decks.all_sorted().into_iter().map(|d| (d.id, d.name.clone())).collect();
        let mut limits: HashMap<String, (i64, i64)> = HashMap::new();
        let mut entries = Vec::with_capacity(decks.len());

        for (deck_id, name) in decks {
            if limits.contains_key(&name) {
                warn!(deck_id, "Removing deck with duplicate name '{}'", name);
                self.remove_deck_inner(deck_id, false, true)?;
                return Ok(Scan::Restart);
            }
            let Some(deck) = self.decks.get(deck_id) else {
                continue;
            };
            let mut new_limit = self.deck_limit_single(deck, LimitKind::New);
            let mut rev_limit = self.deck_limit_single(deck, LimitKind::Review);
            if let Some(parent) = parent_of(&name) {
                let Some(&(parent_new, parent_rev)) = limits.get(parent) else {
                    warn!(deck_id, "Removing deck '{}' with missing parent", name);
                    self.remove_deck_inner(deck_id, false, true)?;
                    return Ok(Scan::Restart);
                };
                new_limit = new_limit.min(parent_new);
                rev_limit = rev_limit.min(parent_rev);
            }
            let new = self.new_for_deck(deck_id, new_limit)?;
            let learn = self.lrn_for_deck(deck_id)?;
            let review = self.rev_for_deck(deck_id, rev_limit)?;
            limits.insert(name.clone(), (new_limit, rev_limit));
            entries.push(DeckDueEntry { name, deck_id, review, learn, new });
        }
        Ok(Scan::Done(entries))
    }

    fn new_for_deck(&mut self, deck_id: DeckId, limit: i64) -> SchedResult<usize> {
        if limit <= 0 {
            return Ok(0);
        }
        let limit = (limit as usize).min(self.sched_config.report_limit);
        let filter = CardFilter::new().deck(deck_id).queue(Queue::New);
        Ok(self.store.count_cards(&filter, Some(limit))?)
    }

    /// Learning steps due before the collapse window ends, plus day-learning cards due today
    fn lrn_for_deck(&mut self, deck_id: DeckId) -> SchedResult<usize> {
        let report_limit = self.sched_config.report_limit;
        let cutoff = self.now_secs() + self.conf.collapse_time;
        let filter = CardFilter::new().deck(deck_id).queue(Queue::Learning).due(DueBound::Before(cutoff));
        let steps: usize = self
            .store
            .query_cards(&filter, CardOrder::Unordered, Some(report_limit))?
            .iter()
            .map(|c| c.steps_remaining_today() as usize)
            .sum();
        let filter = CardFilter::new()
            .deck(deck_id)
            .queue(Queue::DayLearning)
            .due(DueBound::AtOrBefore(self.sched.today));
        let day = self.store.count_cards(&filter, Some(report_limit))?;
        Ok(steps + day)
    }

    fn rev_for_deck(&mut self, deck_id: DeckId, limit: i64) -> SchedResult<usize> {
        if limit <= 0 {
            return Ok(0);
        }
        let limit = (limit as usize).min(self.sched_config.report_limit);
        let filter = CardFilter::new()
            .deck(deck_id)
            .queue(Queue::Review)
            .due(DueBound::AtOrBefore(self.sched.today));
        Ok(self.store.count_cards(&filter, Some(limit))?)
    }

    /// The deck list as a tree
    ///
    /// A node's counts include its descendants, then new and review counts
    /// are clamped to what the deck itself may still show today.
    pub fn deck_due_tree(&mut self) -> SchedResult<Vec<DeckDueNode>> {
        let entries = self.deck_due_list()?;
        let index: HashMap<String, usize> = entries.iter().enumerate().map(|(i, e)| (e.name.clone(), i)).collect();
        let mut slots: Vec<Option<DeckDueNode>> = entries
            .iter()
            .map(|e| {
                Some(DeckDueNode {
                    name: basename_of(&e.name).to_string(),
                    deck_id: e.deck_id,
                    review: e.review,
                    learn: e.learn,
                    new: e.new,
                    collapsed: self.decks.get(e.deck_id).is_some_and(|d| d.collapsed),
                    children: Vec::new(),
                })
            })
            .collect();

        // Deepest first, so a node is complete before it joins its parent.
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(entries[i].name.matches(crate::models::DECK_SEPARATOR).count()));

        let mut roots = Vec::new();
        for i in order {
            let Some(mut node) = slots[i].take() else {
                continue;
            };
            self.finish_node(&mut node);
            let parent = parent_of(&entries[i].name).and_then(|p| index.get(p)).copied();
            match parent.and_then(|p| slots[p].as_mut()) {
                Some(parent_node) => parent_node.children.push(node),
                None => roots.push(node),
            }
        }
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roots)
    }

    fn finish_node(&self, node: &mut DeckDueNode) {
        node.children.sort_by(|a, b| a.name.cmp(&b.name));
        for child in &node.children {
            node.review += child.review;
            node.learn += child.learn;
            node.new += child.new;
        }
        let Some(deck) = self.decks.get(node.deck_id) else {
            return;
        };
        if !deck.is_filtered() {
            let rev_limit = self.deck_limit_single(deck, LimitKind::Review).max(0) as usize;
            let new_limit = self.deck_limit_single(deck, LimitKind::New).max(0) as usize;
            node.review = node.review.min(rev_limit);
            node.new = node.new.min(new_limit);
        }
    }
}
