use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use crate::SharedSession;
use crate::dto::{CreateFilteredDeckDto, FilteredDeckDto};
use crate::errors::ApiError;
use crate::models::DeckId;

/// Handler for creating and building a filtered deck
///
/// This function handles POST requests to `/filtered_decks`. The deck is
/// created, given the requested search, filled and selected in one
/// transaction; if any step fails nothing is kept.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The request payload with the name and search options
///
/// ### Returns
///
/// The new deck's id and the number of cards it received
#[instrument(skip(session, payload), fields(name = %payload.name, search = %payload.search))]
pub async fn create_filtered_deck_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CreateFilteredDeckDto>,
) -> Result<Json<FilteredDeckDto>, ApiError> {
    info!("Creating filtered deck");

    let mut session = session.lock().await;
    session.discard_current();
    let options = payload.to_options();
    let (deck_id, card_count) = session.col.transact(|col| {
        let deck_id = col.add_filtered_deck(&payload.name)?;
        col.update_filtered_deck(deck_id, options)?;
        let card_count = col.rebuild_filtered(deck_id)?;
        Ok((deck_id, card_count))
    })?;

    info!("Filtered deck {} built with {} cards", deck_id, card_count);
    Ok(Json(FilteredDeckDto { deck_id, card_count }))
}

/// Handler for rebuilding a filtered deck
///
/// This function handles POST requests to `/filtered_decks/{id}/rebuild`.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `deck_id` - The filtered deck, extracted from the URL path
///
/// ### Returns
///
/// The number of cards now in the deck
#[instrument(skip(session))]
pub async fn rebuild_filtered_deck_handler(
    State(session): State<SharedSession>,
    Path(deck_id): Path<DeckId>,
) -> Result<Json<FilteredDeckDto>, ApiError> {
    info!("Rebuilding filtered deck");

    let mut session = session.lock().await;
    if session.col.deck(deck_id).is_none() {
        return Err(ApiError::NotFound(format!("Deck not found: {}", deck_id)));
    }
    session.discard_current();
    let card_count = session.col.rebuild_filtered(deck_id)?;

    Ok(Json(FilteredDeckDto { deck_id, card_count }))
}

/// Handler for emptying a filtered deck
///
/// This function handles POST requests to `/filtered_decks/{id}/empty`.
/// The deck itself is kept.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `deck_id` - The filtered deck, extracted from the URL path
///
/// ### Returns
///
/// The number of cards sent back to their home decks
#[instrument(skip(session))]
pub async fn empty_filtered_deck_handler(
    State(session): State<SharedSession>,
    Path(deck_id): Path<DeckId>,
) -> Result<Json<FilteredDeckDto>, ApiError> {
    info!("Emptying filtered deck");

    let mut session = session.lock().await;
    if session.col.deck(deck_id).is_none() {
        return Err(ApiError::NotFound(format!("Deck not found: {}", deck_id)));
    }
    session.discard_current();
    let card_count = session.col.empty_filtered(deck_id)?;

    Ok(Json(FilteredDeckDto { deck_id, card_count }))
}
