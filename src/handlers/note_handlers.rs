use axum::{extract::State, Json};
use tracing::{info, instrument};

use crate::SharedSession;
use crate::dto::{CreateNoteDto, CreatedNoteDto};
use crate::errors::ApiError;
use crate::models::Note;

/// Handler for adding a note
///
/// This function handles POST requests to `/notes`. One new card is created
/// for each requested template ordinal.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The request payload with the deck, fields, tags and ordinals
///
/// ### Returns
///
/// The id of the new note and the ids of its cards
#[instrument(skip(session, payload), fields(deck_id = payload.deck_id, fields = payload.fields.len()))]
pub async fn create_note_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<CreateNoteDto>,
) -> Result<Json<CreatedNoteDto>, ApiError> {
    info!("Adding note");

    if payload.fields.is_empty() {
        return Err(ApiError::BadRequest("A note needs at least one field".to_string()));
    }

    let mut note = Note::new(payload.fields, payload.tags);
    let mut session = session.lock().await;
    let card_ids = session.col.add_note(&mut note, payload.deck_id, &payload.ordinals)?;

    info!("Added note {} with {} cards", note.id, card_ids.len());
    Ok(Json(CreatedNoteDto { note_id: note.id, card_ids }))
}
