use serde::{Deserialize, Serialize};

use crate::models::{Card, CardId, DeckId, DynOrder, FilterTerm, FilteredDeck};
use crate::sched::Counts;

/// Data transfer object for creating a deck
///
/// Creating a deck that already exists returns the existing one.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateDeckDto {
    /// Full `::`-separated deck name; missing parents are created
    pub name: String,
}

/// Data transfer object for renaming a deck
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RenameDeckDto {
    /// The new full name of the deck
    pub name: String,
}

/// Query parameters accepted when removing a deck
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RemoveDeckQuery {
    /// Delete the deck's cards instead of moving them to the default deck
    #[serde(default)]
    pub cards_too: bool,
}

/// A deck as reported by the API
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeckSummaryDto {
    pub id: DeckId,
    pub name: String,
    pub filtered: bool,
}

fn default_filter_limit() -> u32 {
    100
}

fn default_filter_order() -> DynOrder {
    DynOrder::Oldest
}

fn default_resched() -> bool {
    true
}

/// Data transfer object for creating a filtered deck
///
/// The deck is built straight away from a single search term.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateFilteredDeckDto {
    pub name: String,

    /// Search selecting the cards to borrow
    pub search: String,

    /// Most cards gathered by the search
    #[serde(default = "default_filter_limit")]
    pub limit: u32,

    /// Order code of the search results (see [`DynOrder`])
    #[serde(default = "default_filter_order")]
    pub order: DynOrder,

    /// Whether answers in the deck change the cards' schedules
    #[serde(default = "default_resched")]
    pub resched: bool,
}

impl CreateFilteredDeckDto {
    /// The deck options described by this request
    pub fn to_options(&self) -> FilteredDeck {
        FilteredDeck {
            terms: vec![FilterTerm { search: self.search.clone(), limit: self.limit, order: self.order }],
            resched: self.resched,
            ..FilteredDeck::default()
        }
    }
}

/// Result of building or emptying a filtered deck
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FilteredDeckDto {
    pub deck_id: DeckId,
    /// Number of cards moved into (or out of) the deck
    pub card_count: usize,
}

fn default_ordinals() -> Vec<u32> {
    vec![0]
}

/// Data transfer object for adding a note
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateNoteDto {
    /// Deck the new cards are placed in
    pub deck_id: DeckId,

    /// Field contents, front first
    pub fields: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Template ordinals to generate cards for
    #[serde(default = "default_ordinals")]
    pub ordinals: Vec<u32>,
}

/// The note and cards created by a [`CreateNoteDto`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatedNoteDto {
    pub note_id: i64,
    pub card_ids: Vec<CardId>,
}

/// A list of cards to act on in bulk
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CardIdsDto {
    pub card_ids: Vec<CardId>,
}

/// Number of cards a bulk operation was applied to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AffectedDto {
    pub count: usize,
}

/// Data transfer object for answering the card being studied
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnswerDto {
    /// Must match the card handed out by `/study/next`
    pub card_id: CardId,

    /// Button pressed, 1 (again) to 4 (easy)
    pub grade: u8,
}

/// The next card to study, with what the answer buttons would do
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NextCardDto {
    /// `None` when nothing is left to study today
    pub card: Option<Card>,

    /// Remaining counts, including the card in hand
    pub counts: Counts,

    /// Number of answer buttons to offer (2 to 4), 0 without a card
    pub buttons: u8,

    /// Seconds until the card is due again for each grade, again to easy;
    /// empty without a card
    pub intervals: Vec<i64>,
}

/// Outcome of answering a card
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnswerResultDto {
    /// The card after rescheduling
    pub card: Card,
    pub counts: Counts,
}

#[cfg(test)]
mod tests;
