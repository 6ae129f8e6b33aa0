//! Evaluating a parsed search against cards

use std::collections::{HashMap, HashSet};

use regex::{Regex, RegexBuilder};

use super::parser::{Comparison, Node, Property, SearchTerm, StateKind};
use crate::decks::DeckManager;
use crate::errors::{SchedError, SchedResult};
use crate::models::{Card, CardId, CardType, DeckId, Note, NoteId, Queue};
use crate::repo::CardFilter;

/// What a card is checked against besides its own fields
pub(crate) struct MatchContext<'a> {
    pub today: i64,
    pub day_cutoff: i64,
    pub notes: &'a HashMap<NoteId, Note>,
}

/// Where `deck:` names are looked up
pub(crate) struct DeckScope<'a> {
    pub current_deck: DeckId,
    pub decks: &'a DeckManager,
}

/// A search with its patterns compiled and deck names resolved to ids
pub(crate) enum Compiled {
    All,
    And(Vec<Compiled>),
    Or(Vec<Compiled>),
    Not(Box<Compiled>),
    Text(Regex),
    Decks(HashSet<DeckId>),
    InFilteredDeck,
    Tag(Regex),
    NoTags,
    State(StateKind),
    Template(u32),
    NoteIds(HashSet<NoteId>),
    CardIds(HashSet<CardId>),
    Prop(Property, Comparison, f64),
    Dupe(usize, String),
}

/// Turns a glob with `*` wildcards into a case-insensitive regex
fn glob_regex(glob: &str, whole: bool) -> SchedResult<Regex> {
    let body = glob.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    let pattern = if whole { format!("^{}$", body) } else { body };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| SchedError::InvalidSearch(e.to_string()))
}

/// Decks matching a `deck:` pattern, with all of their descendants
fn resolve_decks(pattern: &str, scope: &DeckScope<'_>) -> SchedResult<HashSet<DeckId>> {
    let mut ids = HashSet::new();
    if pattern.eq_ignore_ascii_case("current") {
        ids.extend(scope.decks.deck_and_child_ids(scope.current_deck));
        return Ok(ids);
    }
    let regex = glob_regex(pattern, true)?;
    for deck in scope.decks.all() {
        if regex.is_match(&deck.name) {
            ids.extend(scope.decks.deck_and_child_ids(deck.id));
        }
    }
    Ok(ids)
}

pub(crate) fn compile(node: &Node, scope: &DeckScope<'_>) -> SchedResult<Compiled> {
    Ok(match node {
        Node::All => Compiled::All,
        Node::And(parts) => Compiled::And(parts.iter().map(|p| compile(p, scope)).collect::<SchedResult<_>>()?),
        Node::Or(parts) => Compiled::Or(parts.iter().map(|p| compile(p, scope)).collect::<SchedResult<_>>()?),
        Node::Not(inner) => Compiled::Not(Box::new(compile(inner, scope)?)),
        Node::Term(term) => match term {
            SearchTerm::Text(text) => Compiled::Text(glob_regex(text, false)?),
            SearchTerm::Deck(name) if name.eq_ignore_ascii_case("filtered") => Compiled::InFilteredDeck,
            SearchTerm::Deck(name) if name == "*" => Compiled::All,
            SearchTerm::Deck(name) => Compiled::Decks(resolve_decks(name, scope)?),
            SearchTerm::Tag(tag) if tag.eq_ignore_ascii_case("none") => Compiled::NoTags,
            SearchTerm::Tag(tag) => Compiled::Tag(glob_regex(tag, true)?),
            SearchTerm::State(state) => Compiled::State(*state),
            SearchTerm::Template(ord) => Compiled::Template(*ord),
            SearchTerm::NoteIds(ids) => Compiled::NoteIds(ids.iter().copied().collect()),
            SearchTerm::CardIds(ids) => Compiled::CardIds(ids.iter().copied().collect()),
            SearchTerm::Prop { prop, op, value } => Compiled::Prop(*prop, *op, *value),
            SearchTerm::Dupe { field, value } => Compiled::Dupe(*field, value.trim().to_lowercase()),
        },
    })
}

/// Keeps the values present in both sides; `None` means unrestricted
fn narrow<T: Copy + Eq + std::hash::Hash>(current: &mut Option<HashSet<T>>, values: impl IntoIterator<Item = T>) {
    let values: HashSet<T> = values.into_iter().collect();
    *current = Some(match current.take() {
        Some(existing) => existing.intersection(&values).copied().collect(),
        None => values,
    });
}

fn sorted<T: Copy + Ord>(values: HashSet<T>) -> Vec<T> {
    let mut values: Vec<T> = values.into_iter().collect();
    values.sort_unstable();
    values
}

/// Restrictions every match must satisfy, collected from the terms joined
/// by AND at the top of a search
#[derive(Default)]
struct Required {
    card_ids: Option<HashSet<CardId>>,
    note_ids: Option<HashSet<NoteId>>,
    decks: Option<HashSet<DeckId>>,
    queues: Option<HashSet<Queue>>,
    excluded_queues: HashSet<Queue>,
    types: Option<HashSet<CardType>>,
    in_filtered_deck: Option<bool>,
}

impl Required {
    fn collect(&mut self, compiled: &Compiled) {
        match compiled {
            Compiled::And(parts) => parts.iter().for_each(|p| self.collect(p)),
            Compiled::CardIds(ids) => narrow(&mut self.card_ids, ids.iter().copied()),
            Compiled::NoteIds(ids) => narrow(&mut self.note_ids, ids.iter().copied()),
            Compiled::Decks(ids) => narrow(&mut self.decks, ids.iter().copied()),
            Compiled::InFilteredDeck => self.in_filtered_deck = Some(true),
            Compiled::State(state) => match state {
                StateKind::New => narrow(&mut self.types, [CardType::New]),
                StateKind::Review => narrow(&mut self.types, [CardType::Review]),
                StateKind::Learn => narrow(&mut self.queues, [Queue::Learning, Queue::DayLearning]),
                StateKind::Suspended => narrow(&mut self.queues, [Queue::Suspended]),
                StateKind::Buried => narrow(&mut self.queues, [Queue::Buried]),
                StateKind::Due => narrow(&mut self.queues, [Queue::Review, Queue::DayLearning, Queue::Learning]),
            },
            Compiled::Not(inner) => match inner.as_ref() {
                Compiled::InFilteredDeck => self.in_filtered_deck = Some(false),
                Compiled::State(StateKind::Suspended) => {
                    self.excluded_queues.insert(Queue::Suspended);
                }
                Compiled::State(StateKind::Buried) => {
                    self.excluded_queues.insert(Queue::Buried);
                }
                Compiled::State(StateKind::Learn) => {
                    self.excluded_queues.extend([Queue::Learning, Queue::DayLearning]);
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn into_filter(self) -> CardFilter {
        let mut filter = CardFilter::new();
        if let Some(ids) = self.card_ids {
            filter = filter.ids(&sorted(ids));
        }
        if let Some(ids) = self.note_ids {
            filter = filter.notes(&sorted(ids));
        }
        if let Some(ids) = self.decks {
            filter = filter.home_decks(&sorted(ids));
        }
        if let Some(queues) = self.queues {
            let queues: Vec<Queue> = queues.into_iter().collect();
            filter = filter.queues(&queues);
        }
        if !self.excluded_queues.is_empty() {
            let excluded: Vec<Queue> = self.excluded_queues.into_iter().collect();
            filter = filter.without_queues(&excluded);
        }
        if let Some(types) = self.types {
            let types: Vec<CardType> = types.into_iter().collect();
            filter.types = Some(types);
        }
        if let Some(inside) = self.in_filtered_deck {
            filter = filter.in_filtered_deck(inside);
        }
        filter
    }
}

impl Compiled {
    /// A store query returning every card this search can match, and
    /// usually far fewer
    ///
    /// Only terms that every match must satisfy are pushed down; the full
    /// search still runs over the loaded cards.
    pub fn prefilter(&self) -> CardFilter {
        let mut required = Required::default();
        required.collect(self);
        required.into_filter()
    }

    pub fn matches(&self, card: &Card, ctx: &MatchContext<'_>) -> bool {
        let note = ctx.notes.get(&card.nid);
        match self {
            Compiled::All => true,
            Compiled::And(parts) => parts.iter().all(|p| p.matches(card, ctx)),
            Compiled::Or(parts) => parts.iter().any(|p| p.matches(card, ctx)),
            Compiled::Not(inner) => !inner.matches(card, ctx),
            Compiled::Text(regex) => note.is_some_and(|n| n.fields.iter().any(|f| regex.is_match(f))),
            Compiled::Decks(ids) => ids.contains(&card.did) || (card.odid != 0 && ids.contains(&card.odid)),
            Compiled::InFilteredDeck => card.in_filtered_deck(),
            Compiled::Tag(regex) => note.is_some_and(|n| n.tags().iter().any(|t| regex.is_match(t))),
            Compiled::NoTags => note.is_some_and(|n| n.tags().is_empty()),
            Compiled::State(state) => match state {
                StateKind::New => card.ctype == CardType::New,
                StateKind::Learn => matches!(card.queue, Queue::Learning | Queue::DayLearning),
                StateKind::Review => card.ctype == CardType::Review,
                StateKind::Suspended => card.queue == Queue::Suspended,
                StateKind::Buried => card.queue == Queue::Buried,
                StateKind::Due => match card.queue {
                    Queue::Review | Queue::DayLearning => card.due <= ctx.today,
                    Queue::Learning => card.due <= ctx.day_cutoff,
                    _ => false,
                },
            },
            Compiled::Template(ord) => card.ord == *ord,
            Compiled::NoteIds(ids) => ids.contains(&card.nid),
            Compiled::CardIds(ids) => ids.contains(&card.id),
            Compiled::Prop(prop, op, value) => {
                let actual = match prop {
                    Property::Interval => f64::from(card.ivl),
                    Property::Reps => f64::from(card.reps),
                    Property::Lapses => f64::from(card.lapses),
                    Property::Ease => f64::from(card.factor) / 1000.0,
                    Property::Due => {
                        if !matches!(card.queue, Queue::Review | Queue::DayLearning) {
                            return false;
                        }
                        (card.due - ctx.today) as f64
                    }
                };
                op.holds(actual, *value)
            }
            Compiled::Dupe(field, value) => note
                .and_then(|n| n.fields.get(*field))
                .is_some_and(|f| f.trim().to_lowercase() == *value),
        }
    }
}
