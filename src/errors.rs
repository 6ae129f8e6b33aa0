use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json
};
use thiserror::Error;
use tracing::error;

use crate::models::{CardId, DeckConfigId, DeckId, NoteId};

/// Errors raised by collection and scheduler operations
#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Storage unavailable: {0}")]
    Storage(#[from] anyhow::Error),
    #[error("Card not found: {0}")]
    CardNotFound(CardId),
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),
    #[error("Deck not found: {0}")]
    DeckNotFound(DeckId),
    #[error("Deck config not found: {0}")]
    ConfigNotFound(DeckConfigId),
    #[error("Invalid grade: {0}")]
    InvalidGrade(u8),
    #[error("Card {0} is not in an answerable queue")]
    InvalidQueue(CardId),
    #[error("A deck named '{0}' already exists")]
    DeckExists(String),
    #[error("Decks cannot be nested under filtered deck '{0}'")]
    FilteredDeckNesting(String),
    #[error("Invalid deck name: '{0}'")]
    InvalidDeckName(String),
    #[error("Deck {0} is not a filtered deck")]
    NotFiltered(DeckId),
    #[error("The default deck config cannot be removed")]
    DefaultConfig,
    #[error("Invalid search: {0}")]
    InvalidSearch(String),
}

pub type SchedResult<T> = std::result::Result<T, SchedError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid grade: {0}")]
    InvalidGrade(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("No card is being studied")]
    NoCurrentCard,
}

impl From<SchedError> for ApiError {
    fn from(err: SchedError) -> Self {
        match err {
            SchedError::Storage(inner) => ApiError::Database(inner),
            SchedError::CardNotFound(_)
            | SchedError::NoteNotFound(_)
            | SchedError::DeckNotFound(_)
            | SchedError::ConfigNotFound(_) => ApiError::NotFound(err.to_string()),
            SchedError::InvalidGrade(_) => ApiError::InvalidGrade(err.to_string()),
            SchedError::DeckExists(_) => ApiError::Conflict(err.to_string()),
            SchedError::InvalidQueue(_)
            | SchedError::FilteredDeckNesting(_)
            | SchedError::InvalidDeckName(_)
            | SchedError::NotFiltered(_)
            | SchedError::DefaultConfig
            | SchedError::InvalidSearch(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Database(err) => {
                error!("Storage error while handling request: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidGrade(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NoCurrentCard => (StatusCode::CONFLICT, "No card is being studied".to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests;
