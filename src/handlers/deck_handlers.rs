use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info, instrument};

use crate::{SharedSession, StudySession};
use crate::dto::{CreateDeckDto, DeckSummaryDto, RemoveDeckQuery, RenameDeckDto};
use crate::errors::ApiError;
use crate::models::{DEFAULT_DECK_ID, DeckId};
use crate::sched::{Counts, DeckDueNode};

/// Looks up a deck and describes it for a response
fn deck_summary(session: &StudySession, deck_id: DeckId) -> Result<DeckSummaryDto, ApiError> {
    let deck = session
        .col
        .deck(deck_id)
        .ok_or_else(|| ApiError::NotFound(format!("Deck not found: {}", deck_id)))?;
    Ok(DeckSummaryDto { id: deck.id, name: deck.name.clone(), filtered: deck.is_filtered() })
}

/// Handler for listing decks with their due counts
///
/// This function handles GET requests to `/decks`.
///
/// ### Arguments
///
/// * `session` - The shared study session
///
/// ### Returns
///
/// The top-level decks of the due tree as JSON, each with its children
#[instrument(skip(session))]
pub async fn list_decks_handler(
    State(session): State<SharedSession>,
) -> Result<Json<Vec<DeckDueNode>>, ApiError> {
    debug!("Building deck due tree");

    let mut session = session.lock().await;
    let tree = session.col.deck_due_tree()?;

    debug!("Returning {} top-level decks", tree.len());
    Ok(Json(tree))
}

/// Handler for creating a deck
///
/// This function handles POST requests to `/decks`. Naming an existing deck
/// returns it unchanged.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The request payload with the deck name
///
/// ### Returns
///
/// The created or existing deck as JSON
#[instrument(skip(session, payload), fields(name = %payload.name))]
pub async fn create_deck_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CreateDeckDto>,
) -> Result<Json<DeckSummaryDto>, ApiError> {
    info!("Creating deck");

    let mut session = session.lock().await;
    let deck_id = session
        .col
        .deck_id(&payload.name, true)?
        .ok_or_else(|| ApiError::BadRequest(format!("Could not create deck '{}'", payload.name)))?;

    let summary = deck_summary(&session, deck_id)?;
    info!("Deck '{}' has id {}", summary.name, summary.id);
    Ok(Json(summary))
}

/// Handler for selecting the deck to study
///
/// This function handles POST requests to `/decks/{id}/select`. The card in
/// hand, if any, is dropped and the queues are rebuilt for the new deck.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `deck_id` - The deck to select, extracted from the URL path
///
/// ### Returns
///
/// The counts of the newly selected deck as JSON
#[instrument(skip(session))]
pub async fn select_deck_handler(
    State(session): State<SharedSession>,
    Path(deck_id): Path<DeckId>,
) -> Result<Json<Counts>, ApiError> {
    info!("Selecting deck");

    let mut session = session.lock().await;
    session.discard_current();
    session.col.select_deck(deck_id)?;
    session.col.reset()?;

    Ok(Json(session.col.counts(None)))
}

/// Handler for renaming a deck
///
/// This function handles POST requests to `/decks/{id}/rename`. Children
/// move along with the deck.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `deck_id` - The deck to rename, extracted from the URL path
/// * `payload` - The request payload with the new name
///
/// ### Returns
///
/// The renamed deck as JSON
#[instrument(skip(session, payload), fields(name = %payload.name))]
pub async fn rename_deck_handler(
    State(session): State<SharedSession>,
    Path(deck_id): Path<DeckId>,
    Json(payload): Json<RenameDeckDto>,
) -> Result<Json<DeckSummaryDto>, ApiError> {
    info!("Renaming deck");

    let mut session = session.lock().await;
    session.col.rename_deck(deck_id, &payload.name)?;

    Ok(Json(deck_summary(&session, deck_id)?))
}

/// Handler for removing a deck and its children
///
/// This function handles DELETE requests to `/decks/{id}`.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `deck_id` - The deck to remove, extracted from the URL path
/// * `query` - Whether to delete the cards rather than move them to the default deck
///
/// ### Returns
///
/// 204 No Content on success
#[instrument(skip(session))]
pub async fn remove_deck_handler(
    State(session): State<SharedSession>,
    Path(deck_id): Path<DeckId>,
    Query(query): Query<RemoveDeckQuery>,
) -> Result<StatusCode, ApiError> {
    info!("Removing deck");

    if deck_id == DEFAULT_DECK_ID {
        return Err(ApiError::BadRequest("The default deck cannot be removed".to_string()));
    }

    let mut session = session.lock().await;
    if session.col.deck(deck_id).is_none() {
        return Err(ApiError::NotFound(format!("Deck not found: {}", deck_id)));
    }
    session.discard_current();
    session.col.remove_deck(deck_id, query.cards_too, true)?;

    Ok(StatusCode::NO_CONTENT)
}
