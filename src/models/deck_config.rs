use serde::{Deserialize, Serialize};

use super::{DeckConfigId, MINIMUM_FACTOR, STARTING_FACTOR};

/// How new cards are positioned when they are added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum NewCardOrder {
    Random,
    Due,
}

impl From<i32> for NewCardOrder {
    fn from(code: i32) -> Self {
        if code == 0 { NewCardOrder::Random } else { NewCardOrder::Due }
    }
}

impl From<NewCardOrder> for i32 {
    fn from(order: NewCardOrder) -> i32 {
        match order {
            NewCardOrder::Random => 0,
            NewCardOrder::Due => 1,
        }
    }
}

/// What happens to a card once it is detected as a leech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum LeechAction {
    Suspend,
    TagOnly,
}

impl From<i32> for LeechAction {
    fn from(code: i32) -> Self {
        if code == 1 { LeechAction::TagOnly } else { LeechAction::Suspend }
    }
}

impl From<LeechAction> for i32 {
    fn from(action: LeechAction) -> i32 {
        match action {
            LeechAction::Suspend => 0,
            LeechAction::TagOnly => 1,
        }
    }
}

/// Settings for cards that have not graduated yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewConfig {
    /// Learning steps in minutes
    pub delays: Vec<f32>,
    /// Graduating intervals in days: `[normal, early, unused]`
    pub ints: Vec<u32>,
    pub initial_factor: i32,
    pub separate: bool,
    pub order: NewCardOrder,
    pub per_day: u32,
    /// Bury sibling new cards after one is answered
    pub bury: bool,
}

impl Default for NewConfig {
    fn default() -> Self {
        Self {
            delays: vec![1.0, 10.0],
            ints: vec![1, 4, 7],
            initial_factor: STARTING_FACTOR,
            separate: true,
            order: NewCardOrder::Due,
            per_day: 20,
            bury: true,
        }
    }
}

/// Settings for review cards that were forgotten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LapseConfig {
    /// Relearning steps in minutes
    pub delays: Vec<f32>,
    /// Multiplier applied to the interval on a lapse
    pub mult: f64,
    pub min_int: u32,
    pub leech_fails: u32,
    pub leech_action: LeechAction,
}

impl Default for LapseConfig {
    fn default() -> Self {
        Self {
            delays: vec![10.0],
            mult: 0.0,
            min_int: 1,
            leech_fails: 8,
            leech_action: LeechAction::Suspend,
        }
    }
}

/// Settings for graduated cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevConfig {
    pub per_day: u32,
    /// Extra multiplier for Easy answers
    pub ease4: f64,
    pub fuzz: f64,
    pub min_space: u32,
    /// Global interval multiplier
    pub ivl_fct: f64,
    pub max_ivl: u32,
    /// Bury sibling review cards after one is answered
    pub bury: bool,
}

impl Default for RevConfig {
    fn default() -> Self {
        Self {
            per_day: 100,
            ease4: 1.3,
            fuzz: 0.05,
            min_space: 1,
            ivl_fct: 1.0,
            max_ivl: 36_500,
            bury: true,
        }
    }
}

/// A preset shared by any number of normal decks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeckConfig {
    pub id: DeckConfigId,
    pub name: String,
    #[serde(rename = "mod")]
    pub mtime: i64,
    pub usn: i32,
    /// Cap on recorded answer time, in seconds
    pub max_taken: u32,
    pub timer: i32,
    pub autoplay: bool,
    pub replayq: bool,
    pub new: NewConfig,
    pub lapse: LapseConfig,
    pub rev: RevConfig,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: "Default".to_string(),
            mtime: 0,
            usn: 0,
            max_taken: 60,
            timer: 0,
            autoplay: true,
            replayq: true,
            new: NewConfig::default(),
            lapse: LapseConfig::default(),
            rev: RevConfig::default(),
        }
    }
}

impl DeckConfig {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    /// Repairs values that would break scheduling
    ///
    /// Called whenever a config is loaded or saved, so the scheduler can rely
    /// on every field being usable.
    pub fn validated(mut self) -> Self {
        let defaults = NewConfig::default();
        while self.new.ints.len() < 2 {
            let next = defaults.ints[self.new.ints.len()];
            self.new.ints.push(next);
        }
        self.new.ints.iter_mut().for_each(|i| *i = (*i).max(1));
        self.new.initial_factor = self.new.initial_factor.max(MINIMUM_FACTOR);
        self.new.delays.retain(|d| d.is_finite() && *d > 0.0);
        self.lapse.delays.retain(|d| d.is_finite() && *d > 0.0);
        self.lapse.min_int = self.lapse.min_int.max(1);
        if !self.lapse.mult.is_finite() || self.lapse.mult < 0.0 {
            self.lapse.mult = 0.0;
        }
        if !self.rev.ivl_fct.is_finite() || self.rev.ivl_fct <= 0.0 {
            self.rev.ivl_fct = 1.0;
        }
        if !self.rev.ease4.is_finite() || self.rev.ease4 < 1.0 {
            self.rev.ease4 = 1.0;
        }
        self.rev.max_ivl = self.rev.max_ivl.max(1);
        self.max_taken = self.max_taken.max(1);
        self
    }
}
