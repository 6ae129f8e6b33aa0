use engram::dto::{
    AffectedDto, AnswerDto, AnswerResultDto, CardIdsDto, CreateDeckDto, CreateFilteredDeckDto,
    CreateNoteDto, CreatedNoteDto, DeckSummaryDto, FilteredDeckDto, NextCardDto, RenameDeckDto,
};
use engram::models::{Card, CardId, DeckId};
use engram::sched::{Counts, DeckDueNode};
use reqwest::Client;

/// Error type for CLI client operations
#[derive(Debug)]
pub enum ClientError {
    /// Server returned an error status with a message body
    Server { status: reqwest::StatusCode, message: String },
    /// Network/connection/request error
    Request(reqwest::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Server { status, message } => {
                write!(f, "Server error ({}): {}", status.as_u16(), message)
            }
            ClientError::Request(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Request(err) => Some(err),
            ClientError::Server { .. } => None,
        }
    }
}

/// Extension trait for checking HTTP responses and extracting server error messages
trait ResponseExt {
    /// Checks for error status and extracts the server's error message body
    async fn check(self) -> Result<reqwest::Response, ClientError>;
}

impl ResponseExt for reqwest::Response {
    async fn check(self) -> Result<reqwest::Response, ClientError> {
        if self.status().is_success() {
            return Ok(self);
        }
        let status = self.status();
        let message = match self.json::<serde_json::Value>().await {
            Ok(body) => body.get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("Unknown error")
                .to_string(),
            Err(_) => format!("HTTP {}", status),
        };
        Err(ClientError::Server { status, message })
    }
}

/// Card operations that take a list of ids
#[derive(Debug, Clone, Copy)]
pub enum BulkAction {
    Suspend,
    Unsuspend,
    Bury,
    Reset,
}

impl BulkAction {
    fn path(self) -> &'static str {
        match self {
            BulkAction::Suspend => "suspend",
            BulkAction::Unsuspend => "unsuspend",
            BulkAction::Bury => "bury",
            BulkAction::Reset => "reset",
        }
    }
}

/// HTTP client wrapper for communicating with the engram server
pub struct EngramClient {
    /// The base URL of the server (e.g. "http://127.0.0.1:3000")
    base_url: String,
    /// The underlying HTTP client
    client: Client,
}

impl EngramClient {
    /// Creates a new EngramClient
    ///
    /// ### Arguments
    ///
    /// * `base_url` - The base URL of the engram server
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    // ── Deck endpoints ───────────────────────────────────────────────

    /// Gets the deck tree with due counts
    pub async fn list_decks(&self) -> Result<Vec<DeckDueNode>, ClientError> {
        let url = format!("{}/decks", self.base_url);
        let response = self.client.get(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Creates a deck, or finds the existing one with that name
    pub async fn create_deck(&self, name: String) -> Result<DeckSummaryDto, ClientError> {
        let url = format!("{}/decks", self.base_url);
        let dto = CreateDeckDto { name };
        let response = self.client.post(&url).json(&dto).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Selects the deck to study
    pub async fn select_deck(&self, id: DeckId) -> Result<Counts, ClientError> {
        let url = format!("{}/decks/{}/select", self.base_url, id);
        let response = self.client.post(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Renames a deck
    pub async fn rename_deck(&self, id: DeckId, name: String) -> Result<DeckSummaryDto, ClientError> {
        let url = format!("{}/decks/{}/rename", self.base_url, id);
        let dto = RenameDeckDto { name };
        let response = self.client.post(&url).json(&dto).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Removes a deck and its children
    pub async fn remove_deck(&self, id: DeckId, cards_too: bool) -> Result<(), ClientError> {
        let url = format!("{}/decks/{}", self.base_url, id);
        self.client.delete(&url).query(&[("cards_too", cards_too)])
            .send().await.map_err(ClientError::Request)?
            .check().await?;
        Ok(())
    }

    // ── Filtered deck endpoints ──────────────────────────────────────

    /// Creates and builds a filtered deck
    pub async fn create_filtered_deck(&self, dto: &CreateFilteredDeckDto) -> Result<FilteredDeckDto, ClientError> {
        let url = format!("{}/filtered_decks", self.base_url);
        let response = self.client.post(&url).json(dto).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Rebuilds a filtered deck
    pub async fn rebuild_filtered_deck(&self, id: DeckId) -> Result<FilteredDeckDto, ClientError> {
        let url = format!("{}/filtered_decks/{}/rebuild", self.base_url, id);
        let response = self.client.post(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Returns a filtered deck's cards to their home decks
    pub async fn empty_filtered_deck(&self, id: DeckId) -> Result<FilteredDeckDto, ClientError> {
        let url = format!("{}/filtered_decks/{}/empty", self.base_url, id);
        let response = self.client.post(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    // ── Note and card endpoints ──────────────────────────────────────

    /// Adds a note and its cards
    pub async fn add_note(&self, dto: &CreateNoteDto) -> Result<CreatedNoteDto, ClientError> {
        let url = format!("{}/notes", self.base_url);
        let response = self.client.post(&url).json(dto).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Gets a specific card by ID
    pub async fn get_card(&self, id: CardId) -> Result<Card, ClientError> {
        let url = format!("{}/cards/{}", self.base_url, id);
        let response = self.client.get(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Applies a bulk operation to cards
    pub async fn bulk_cards(&self, action: BulkAction, card_ids: Vec<CardId>) -> Result<AffectedDto, ClientError> {
        let url = format!("{}/cards/{}", self.base_url, action.path());
        let dto = CardIdsDto { card_ids };
        let response = self.client.post(&url).json(&dto).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    // ── Study endpoints ──────────────────────────────────────────────

    /// Gets the card to study next
    pub async fn next_card(&self) -> Result<NextCardDto, ClientError> {
        let url = format!("{}/study/next", self.base_url);
        let response = self.client.get(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Answers the card in hand
    pub async fn answer(&self, card_id: CardId, grade: u8) -> Result<AnswerResultDto, ClientError> {
        let url = format!("{}/study/answer", self.base_url);
        let dto = AnswerDto { card_id, grade };
        let response = self.client.post(&url).json(&dto).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Gets the remaining counts of the selected deck
    pub async fn counts(&self) -> Result<Counts, ClientError> {
        let url = format!("{}/study/counts", self.base_url);
        let response = self.client.get(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }
}
