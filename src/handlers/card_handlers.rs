use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info, instrument};

use crate::SharedSession;
use crate::dto::{AffectedDto, CardIdsDto};
use crate::errors::ApiError;
use crate::models::{Card, CardId};

/// Handler for retrieving a specific card
///
/// This function handles GET requests to `/cards/{id}`.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `card_id` - The ID of the card to retrieve, extracted from the URL path
///
/// ### Returns
///
/// The requested card as JSON
#[instrument(skip(session))]
pub async fn get_card_handler(
    State(session): State<SharedSession>,
    Path(card_id): Path<CardId>,
) -> Result<Json<Card>, ApiError> {
    debug!("Getting card");

    let mut session = session.lock().await;
    let card = session.col.get_card(card_id)?;

    Ok(Json(card))
}

/// Handler for suspending cards
///
/// This function handles POST requests to `/cards/suspend`. Cards in
/// filtered decks are sent home first.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The cards to suspend
///
/// ### Returns
///
/// The number of card ids acted on
#[instrument(skip(session, payload), fields(count = payload.card_ids.len()))]
pub async fn suspend_cards_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CardIdsDto>,
) -> Result<Json<AffectedDto>, ApiError> {
    info!("Suspending cards");

    let mut session = session.lock().await;
    session.discard_current();
    session.col.suspend_cards(&payload.card_ids)?;

    Ok(Json(AffectedDto { count: payload.card_ids.len() }))
}

/// Handler for unsuspending cards
///
/// This function handles POST requests to `/cards/unsuspend`.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The cards to unsuspend
///
/// ### Returns
///
/// The number of card ids acted on
#[instrument(skip(session, payload), fields(count = payload.card_ids.len()))]
pub async fn unsuspend_cards_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CardIdsDto>,
) -> Result<Json<AffectedDto>, ApiError> {
    info!("Unsuspending cards");

    let mut session = session.lock().await;
    session.discard_current();
    session.col.unsuspend_cards(&payload.card_ids)?;

    Ok(Json(AffectedDto { count: payload.card_ids.len() }))
}

/// Handler for burying cards until tomorrow
///
/// This function handles POST requests to `/cards/bury`.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The cards to bury
///
/// ### Returns
///
/// The number of card ids acted on
#[instrument(skip(session, payload), fields(count = payload.card_ids.len()))]
pub async fn bury_cards_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CardIdsDto>,
) -> Result<Json<AffectedDto>, ApiError> {
    info!("Burying cards");

    let mut session = session.lock().await;
    session.discard_current();
    session.col.bury_cards(&payload.card_ids)?;

    Ok(Json(AffectedDto { count: payload.card_ids.len() }))
}

/// Handler for forgetting cards
///
/// This function handles POST requests to `/cards/reset`. The cards become
/// new again and go to the end of the new queue.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The cards to reset
///
/// ### Returns
///
/// The number of card ids acted on
#[instrument(skip(session, payload), fields(count = payload.card_ids.len()))]
pub async fn reset_cards_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CardIdsDto>,
) -> Result<Json<AffectedDto>, ApiError> {
    info!("Resetting cards");

    let mut session = session.lock().await;
    session.discard_current();
    session.col.reset_cards(&payload.card_ids)?;

    Ok(Json(AffectedDto { count: payload.card_ids.len() }))
}
