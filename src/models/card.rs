use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CardId, DeckId, NoteId};

/// Starting ease factor for cards that have never graduated (x1000)
pub const STARTING_FACTOR: i32 = 2500;

/// Lowest ease factor a card can fall to (x1000)
pub const MINIMUM_FACTOR: i32 = 1300;

/// The scheduling bucket a card currently sits in
///
/// The integer codes are part of the persisted format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Queue {
    Buried,
    Suspended,
    New,
    Learning,
    Review,
    DayLearning,
}

impl Queue {
    /// Returns the persisted integer code for the queue
    pub fn code(self) -> i32 {
        match self {
            Queue::Buried => -2,
            Queue::Suspended => -1,
            Queue::New => 0,
            Queue::Learning => 1,
            Queue::Review => 2,
            Queue::DayLearning => 3,
        }
    }

    /// True for queues a card can be presented from
    pub fn is_active(self) -> bool {
        self.code() >= 0
    }
}

impl From<Queue> for i32 {
    fn from(queue: Queue) -> i32 {
        queue.code()
    }
}

impl TryFrom<i32> for Queue {
    type Error = InvalidCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -2 => Ok(Queue::Buried),
            -1 => Ok(Queue::Suspended),
            0 => Ok(Queue::New),
            1 => Ok(Queue::Learning),
            2 => Ok(Queue::Review),
            3 => Ok(Queue::DayLearning),
            other => Err(InvalidCode { kind: "queue", code: other }),
        }
    }
}

/// Where a card is in its lifecycle, independent of burying or suspension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum CardType {
    New,
    Learning,
    Review,
}

impl CardType {
    /// Returns the persisted integer code for the card type
    pub fn code(self) -> i32 {
        match self {
            CardType::New => 0,
            CardType::Learning => 1,
            CardType::Review => 2,
        }
    }

    /// The queue a card of this type returns to when it is unburied or unsuspended
    pub fn home_queue(self) -> Queue {
        match self {
            CardType::New => Queue::New,
            CardType::Learning => Queue::Learning,
            CardType::Review => Queue::Review,
        }
    }
}

impl From<CardType> for i32 {
    fn from(card_type: CardType) -> i32 {
        card_type.code()
    }
}

impl TryFrom<i32> for CardType {
    type Error = InvalidCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CardType::New),
            1 => Ok(CardType::Learning),
            2 => Ok(CardType::Review),
            other => Err(InvalidCode { kind: "card type", code: other }),
        }
    }
}

/// Error returned when a persisted integer code has no matching variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCode {
    pub kind: &'static str,
    pub code: i32,
}

impl fmt::Display for InvalidCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} code: {}", self.kind, self.code)
    }
}

impl std::error::Error for InvalidCode {}

/// Represents a single reviewable unit: one template of one note
///
/// `due` is interpreted according to `queue`: a day number for review and
/// day-learning cards, epoch seconds for learning cards, and a position for
/// new cards. `left` packs the remaining learning steps as
/// `remaining_today * 1000 + remaining_total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Unique, time-derived identifier
    pub id: CardId,

    /// The note this card was generated from
    pub nid: NoteId,

    /// The deck the card currently lives in (a filtered deck while relocated)
    pub did: DeckId,

    /// Template ordinal
    pub ord: u32,

    /// Modification time in epoch seconds
    pub mtime: i64,

    /// Update sequence number
    pub usn: i32,

    #[serde(rename = "type")]
    pub ctype: CardType,

    pub queue: Queue,

    pub due: i64,

    /// Interval in days
    pub ivl: u32,

    /// Ease factor x1000
    pub factor: i32,

    pub reps: u32,

    pub lapses: u32,

    pub left: u32,

    /// Due value from before the card was moved into a filtered deck
    pub odue: i64,

    /// Home deck while the card is in a filtered deck, 0 otherwise
    pub odid: DeckId,

    pub flags: i32,

    pub data: String,

    /// When the card was shown, in epoch milliseconds
    #[serde(skip)]
    timer_started: Option<i64>,
}

impl Card {
    /// Creates a new card for a note
    ///
    /// ### Arguments
    ///
    /// * `id` - The card id
    /// * `nid` - The note this card belongs to
    /// * `did` - The deck the card is placed in
    /// * `ord` - The template ordinal
    /// * `due` - The new-card position
    ///
    /// ### Returns
    ///
    /// A new `Card` in the new queue
    pub fn new(id: CardId, nid: NoteId, did: DeckId, ord: u32, due: i64) -> Self {
        Self {
            id,
            nid,
            did,
            ord,
            mtime: 0,
            usn: 0,
            ctype: CardType::New,
            queue: Queue::New,
            due,
            ivl: 0,
            factor: 0,
            reps: 0,
            lapses: 0,
            left: 0,
            odue: 0,
            odid: 0,
            flags: 0,
            data: String::new(),
            timer_started: None,
        }
    }

    /// True while the card is relocated into a filtered deck
    pub fn in_filtered_deck(&self) -> bool {
        self.odid != 0
    }

    /// The deck whose configuration governs the card's scheduling
    pub fn home_deck(&self) -> DeckId {
        if self.odid != 0 { self.odid } else { self.did }
    }

    /// Learning steps left before graduation
    pub fn steps_remaining(&self) -> u32 {
        self.left % 1000
    }

    /// Learning steps that can still be completed before the day cutoff
    pub fn steps_remaining_today(&self) -> u32 {
        self.left / 1000
    }

    /// Starts the answer timer
    ///
    /// ### Arguments
    ///
    /// * `now_ms` - The current time in epoch milliseconds
    pub fn start_timer(&mut self, now_ms: i64) {
        self.timer_started = Some(now_ms);
    }

    /// Time spent on the card since the timer started, in milliseconds
    ///
    /// ### Arguments
    ///
    /// * `now_ms` - The current time in epoch milliseconds
    /// * `max_taken_secs` - The configured cap on recorded answer time
    ///
    /// ### Returns
    ///
    /// The elapsed time, capped at `max_taken_secs`, or 0 if the timer never started
    pub fn time_taken(&self, now_ms: i64, max_taken_secs: u32) -> i64 {
        match self.timer_started {
            Some(started) => (now_ms - started).max(0).min(max_taken_secs as i64 * 1000),
            None => 0,
        }
    }
}

#[cfg(test)]
mod prop_tests;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_new() {
        let card = Card::new(10, 20, 1, 0, 5);

        assert_eq!(card.id, 10);
        assert_eq!(card.nid, 20);
        assert_eq!(card.did, 1);
        assert_eq!(card.queue, Queue::New);
        assert_eq!(card.ctype, CardType::New);
        assert_eq!(card.due, 5);
        assert!(!card.in_filtered_deck());
        assert_eq!(card.home_deck(), 1);
    }

    #[test]
    fn test_left_packing() {
        let mut card = Card::new(1, 1, 1, 0, 0);
        card.left = 2003;
        assert_eq!(card.steps_remaining(), 3);
        assert_eq!(card.steps_remaining_today(), 2);
    }

    #[test]
    fn test_time_taken_without_timer() {
        let card = Card::new(1, 1, 1, 0, 0);
        assert_eq!(card.time_taken(1_000_000, 60), 0);
    }

    #[test]
    fn test_time_taken_is_capped() {
        let mut card = Card::new(1, 1, 1, 0, 0);
        card.start_timer(1_000);
        assert_eq!(card.time_taken(6_000, 60), 5_000);
        assert_eq!(card.time_taken(1_000 + 120_000, 60), 60_000);
    }

    #[test]
    fn test_home_deck_while_filtered() {
        let mut card = Card::new(1, 1, 5, 0, 0);
        card.odid = 3;
        assert!(card.in_filtered_deck());
        assert_eq!(card.home_deck(), 3);
    }

    #[test]
    fn test_queue_codes() {
        for queue in [
            Queue::Buried,
            Queue::Suspended,
            Queue::New,
            Queue::Learning,
            Queue::Review,
            Queue::DayLearning,
        ] {
            assert_eq!(Queue::try_from(queue.code()), Ok(queue));
        }
        assert_eq!(Queue::New.code(), 0);
        assert_eq!(Queue::DayLearning.code(), 3);
        assert_eq!(Queue::Suspended.code(), -1);
        assert_eq!(Queue::Buried.code(), -2);
        assert!(Queue::try_from(7).is_err());
        assert!(!Queue::Suspended.is_active());
    }

    #[test]
    fn test_card_json_uses_integer_codes() {
        let mut card = Card::new(1, 2, 3, 0, 4);
        card.queue = Queue::Buried;
        card.ctype = CardType::Review;
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["queue"], -2);
        assert_eq!(json["type"], 2);
        assert!(json.get("timer_started").is_none());
    }
}
