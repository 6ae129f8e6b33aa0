use serde::{Deserialize, Serialize};

use super::{DEFAULT_DECK_ID, DeckId};

/// How new cards are mixed in with reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum NewSpread {
    Distribute,
    Last,
    First,
}

impl From<i32> for NewSpread {
    fn from(code: i32) -> Self {
        match code {
            1 => NewSpread::Last,
            2 => NewSpread::First,
            _ => NewSpread::Distribute,
        }
    }
}

impl From<NewSpread> for i32 {
    fn from(spread: NewSpread) -> i32 {
        match spread {
            NewSpread::Distribute => 0,
            NewSpread::Last => 1,
            NewSpread::First => 2,
        }
    }
}

/// Collection-wide study settings, persisted as JSON in the `col` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionConf {
    /// The current deck and its descendants, in study order
    pub active_decks: Vec<DeckId>,
    pub cur_deck: DeckId,
    pub new_spread: NewSpread,
    /// Seconds ahead a learning card may be shown when nothing else is due
    pub collapse_time: i64,
    /// Day index on which buried cards were last restored
    pub last_unburied: i64,
    /// Next position handed to a new card
    pub next_pos: i64,
}

impl Default for CollectionConf {
    fn default() -> Self {
        Self {
            active_decks: vec![DEFAULT_DECK_ID],
            cur_deck: DEFAULT_DECK_ID,
            new_spread: NewSpread::Distribute,
            collapse_time: 1200,
            last_unburied: 0,
            next_pos: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_keys() {
        let value = serde_json::to_value(CollectionConf::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "activeDecks": [1],
                "curDeck": 1,
                "newSpread": 0,
                "collapseTime": 1200,
                "lastUnburied": 0,
                "nextPos": 1
            })
        );
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let conf: CollectionConf = serde_json::from_str("{}").unwrap();
        assert_eq!(conf, CollectionConf::default());
    }
}
