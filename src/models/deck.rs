use serde::{Deserialize, Serialize};

use super::{DEFAULT_CONFIG_ID, DeckConfigId, DeckId};

/// Separator between the levels of a deck name
pub const DECK_SEPARATOR: &str = "::";

/// A `[day, count]` pair; the count only applies while `day` is today
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, i64)", into = "(i64, i64)")]
pub struct DayCount {
    pub day: i64,
    pub count: i64,
}

impl DayCount {
    /// The count for `today`, or 0 if the pair is from an earlier day
    pub fn on(&self, today: i64) -> i64 {
        if self.day == today { self.count } else { 0 }
    }

    /// Adds `delta` to today's count, restarting the count if the day rolled over
    pub fn add(&mut self, today: i64, delta: i64) {
        if self.day != today {
            *self = DayCount { day: today, count: 0 };
        }
        self.count += delta;
    }

    /// Resets the pair if it belongs to an earlier day
    ///
    /// ### Returns
    ///
    /// `true` if the pair was reset
    pub fn roll_over(&mut self, today: i64) -> bool {
        if self.day != today {
            *self = DayCount { day: today, count: 0 };
            true
        } else {
            false
        }
    }
}

impl From<(i64, i64)> for DayCount {
    fn from((day, count): (i64, i64)) -> Self {
        Self { day, count }
    }
}

impl From<DayCount> for (i64, i64) {
    fn from(pair: DayCount) -> Self {
        (pair.day, pair.count)
    }
}

/// Order in which a filtered deck's search results are gathered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum DynOrder {
    Oldest,
    Random,
    SmallestInterval,
    LargestInterval,
    MostLapses,
    Added,
    Due,
    ReverseAdded,
    DuePriority,
}

impl From<i32> for DynOrder {
    fn from(code: i32) -> Self {
        match code {
            0 => DynOrder::Oldest,
            1 => DynOrder::Random,
            2 => DynOrder::SmallestInterval,
            3 => DynOrder::LargestInterval,
            4 => DynOrder::MostLapses,
            5 => DynOrder::Added,
            7 => DynOrder::ReverseAdded,
            8 => DynOrder::DuePriority,
            _ => DynOrder::Due,
        }
    }
}

impl From<DynOrder> for i32 {
    fn from(order: DynOrder) -> i32 {
        match order {
            DynOrder::Oldest => 0,
            DynOrder::Random => 1,
            DynOrder::SmallestInterval => 2,
            DynOrder::LargestInterval => 3,
            DynOrder::MostLapses => 4,
            DynOrder::Added => 5,
            DynOrder::Due => 6,
            DynOrder::ReverseAdded => 7,
            DynOrder::DuePriority => 8,
        }
    }
}

/// One saved search of a filtered deck, persisted as `[search, limit, order]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, u32, DynOrder)", into = "(String, u32, DynOrder)")]
pub struct FilterTerm {
    pub search: String,
    pub limit: u32,
    pub order: DynOrder,
}

impl From<(String, u32, DynOrder)> for FilterTerm {
    fn from((search, limit, order): (String, u32, DynOrder)) -> Self {
        Self { search, limit, order }
    }
}

impl From<FilterTerm> for (String, u32, DynOrder) {
    fn from(term: FilterTerm) -> Self {
        (term.search, term.limit, term.order)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalDeck {
    pub conf: DeckConfigId,
    /// Default amount offered when extending today's new limit
    pub extend_new: u32,
    pub extend_rev: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredDeck {
    pub terms: Vec<FilterTerm>,
    /// When true, answers in the deck affect the card's normal schedule
    pub resched: bool,
    /// Custom learning steps in minutes; `None` uses the home deck's steps
    pub delays: Option<Vec<f32>>,
    pub separate: bool,
    pub return_cards: bool,
}

impl Default for FilteredDeck {
    fn default() -> Self {
        Self {
            terms: vec![FilterTerm { search: String::new(), limit: 100, order: DynOrder::Oldest }],
            resched: true,
            delays: None,
            separate: true,
            return_cards: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeckKind {
    Normal(NormalDeck),
    Filtered(FilteredDeck),
}

/// A named node in the deck hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DeckJson", into = "DeckJson")]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub mtime: i64,
    pub usn: i32,
    pub desc: String,
    pub collapsed: bool,
    pub new_today: DayCount,
    pub rev_today: DayCount,
    pub lrn_today: DayCount,
    /// Milliseconds spent answering today
    pub time_today: DayCount,
    pub kind: DeckKind,
}

impl Deck {
    pub fn new_normal(name: &str) -> Self {
        Self::with_kind(
            name,
            DeckKind::Normal(NormalDeck { conf: DEFAULT_CONFIG_ID, extend_new: 10, extend_rev: 50 }),
        )
    }

    pub fn new_filtered(name: &str) -> Self {
        Self::with_kind(name, DeckKind::Filtered(FilteredDeck::default()))
    }

    fn with_kind(name: &str, kind: DeckKind) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            mtime: 0,
            usn: 0,
            desc: String::new(),
            collapsed: false,
            new_today: DayCount::default(),
            rev_today: DayCount::default(),
            lrn_today: DayCount::default(),
            time_today: DayCount::default(),
            kind,
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self.kind, DeckKind::Filtered(_))
    }

    /// The config id of a normal deck; filtered decks have none
    pub fn config_id(&self) -> Option<DeckConfigId> {
        match &self.kind {
            DeckKind::Normal(normal) => Some(normal.conf),
            DeckKind::Filtered(_) => None,
        }
    }

    pub fn filtered(&self) -> Option<&FilteredDeck> {
        match &self.kind {
            DeckKind::Filtered(filtered) => Some(filtered),
            DeckKind::Normal(_) => None,
        }
    }

    pub fn filtered_mut(&mut self) -> Option<&mut FilteredDeck> {
        match &mut self.kind {
            DeckKind::Filtered(filtered) => Some(filtered),
            DeckKind::Normal(_) => None,
        }
    }

    /// Resets every per-day counter that belongs to an earlier day
    ///
    /// ### Returns
    ///
    /// `true` if any counter changed
    pub fn roll_over(&mut self, today: i64) -> bool {
        let mut changed = false;
        for pair in [&mut self.new_today, &mut self.rev_today, &mut self.lrn_today, &mut self.time_today] {
            changed |= pair.roll_over(today);
        }
        changed
    }

    /// The name split into its levels
    pub fn components(&self) -> Vec<&str> {
        self.name.split(DECK_SEPARATOR).collect()
    }

    /// The last level of the name
    pub fn basename(&self) -> &str {
        self.name.rsplit(DECK_SEPARATOR).next().unwrap_or(&self.name)
    }

    /// Full name of the parent deck, if this deck is nested
    pub fn parent_name(&self) -> Option<&str> {
        self.name.rfind(DECK_SEPARATOR).map(|idx| &self.name[..idx])
    }

    pub fn depth(&self) -> usize {
        self.name.matches(DECK_SEPARATOR).count()
    }
}

/// Persisted JSON layout of a deck
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckJson {
    #[serde(default)]
    id: DeckId,
    #[serde(default)]
    name: String,
    #[serde(rename = "mod", default)]
    mtime: i64,
    #[serde(default)]
    usn: i32,
    #[serde(default)]
    desc: String,
    #[serde(rename = "dyn", default)]
    is_dyn: u8,
    #[serde(default)]
    collapsed: bool,
    #[serde(default)]
    new_today: DayCount,
    #[serde(default)]
    rev_today: DayCount,
    #[serde(default)]
    lrn_today: DayCount,
    #[serde(default)]
    time_today: DayCount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conf: Option<DeckConfigId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extend_new: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extend_rev: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terms: Option<Vec<FilterTerm>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resched: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delays: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    separate: Option<bool>,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    return_cards: Option<bool>,
}

impl TryFrom<DeckJson> for Deck {
    type Error = String;

    fn try_from(raw: DeckJson) -> Result<Self, Self::Error> {
        let kind = match raw.is_dyn {
            0 => DeckKind::Normal(NormalDeck {
                conf: raw.conf.unwrap_or(DEFAULT_CONFIG_ID),
                extend_new: raw.extend_new.unwrap_or(10),
                extend_rev: raw.extend_rev.unwrap_or(50),
            }),
            1 => {
                let defaults = FilteredDeck::default();
                DeckKind::Filtered(FilteredDeck {
                    terms: raw.terms.unwrap_or(defaults.terms),
                    resched: raw.resched.unwrap_or(defaults.resched),
                    delays: raw.delays,
                    separate: raw.separate.unwrap_or(defaults.separate),
                    return_cards: raw.return_cards.unwrap_or(defaults.return_cards),
                })
            }
            other => return Err(format!("unknown deck kind: dyn={}", other)),
        };
        Ok(Deck {
            id: raw.id,
            name: raw.name,
            mtime: raw.mtime,
            usn: raw.usn,
            desc: raw.desc,
            collapsed: raw.collapsed,
            new_today: raw.new_today,
            rev_today: raw.rev_today,
            lrn_today: raw.lrn_today,
            time_today: raw.time_today,
            kind,
        })
    }
}

impl From<Deck> for DeckJson {
    fn from(deck: Deck) -> Self {
        let mut raw = DeckJson {
            id: deck.id,
            name: deck.name,
            mtime: deck.mtime,
            usn: deck.usn,
            desc: deck.desc,
            is_dyn: 0,
            collapsed: deck.collapsed,
            new_today: deck.new_today,
            rev_today: deck.rev_today,
            lrn_today: deck.lrn_today,
            time_today: deck.time_today,
            conf: None,
            extend_new: None,
            extend_rev: None,
            terms: None,
            resched: None,
            delays: None,
            separate: None,
            return_cards: None,
        };
        match deck.kind {
            DeckKind::Normal(normal) => {
                raw.conf = Some(normal.conf);
                raw.extend_new = Some(normal.extend_new);
                raw.extend_rev = Some(normal.extend_rev);
            }
            DeckKind::Filtered(filtered) => {
                raw.is_dyn = 1;
                raw.terms = Some(filtered.terms);
                raw.resched = Some(filtered.resched);
                raw.delays = filtered.delays;
                raw.separate = Some(filtered.separate);
                raw.return_cards = Some(filtered.return_cards);
            }
        }
        raw
    }
}
