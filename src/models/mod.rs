/// Data models module
///
/// This module defines the entities the scheduler works on: cards, notes,
/// decks and their shared configs, review log entries and the collection-wide
/// settings. None of these types know about storage; the repository layer
/// converts them to and from rows.

pub type CardId = i64;
pub type NoteId = i64;
pub type DeckId = i64;
pub type DeckConfigId = i64;

/// Id of the permanent default deck
pub const DEFAULT_DECK_ID: DeckId = 1;

/// Id of the default deck config
pub const DEFAULT_CONFIG_ID: DeckConfigId = 1;

mod card;
pub use card::{Card, CardType, InvalidCode, MINIMUM_FACTOR, Queue, STARTING_FACTOR};

mod note;
pub use note::{Note, FIELD_SEPARATOR};

mod deck;
pub use deck::{DECK_SEPARATOR, DayCount, Deck, DeckKind, DynOrder, FilterTerm, FilteredDeck, NormalDeck};

mod deck_config;
pub use deck_config::{DeckConfig, LapseConfig, LeechAction, NewCardOrder, NewConfig, RevConfig};

mod revlog;
pub use revlog::{Grade, ReviewLogEntry, ReviewType};

mod collection_conf;
pub use collection_conf::{CollectionConf, NewSpread};
