use axum::{extract::State, Json};
use tracing::{debug, info, instrument};

use crate::SharedSession;
use crate::dto::{AnswerDto, AnswerResultDto, NextCardDto};
use crate::errors::ApiError;
use crate::models::Grade;
use crate::sched::Counts;

/// Handler for fetching the next card to study
///
/// This function handles GET requests to `/study/next`. While a card is in
/// hand it is returned again; otherwise the scheduler picks the next one.
///
/// ### Arguments
///
/// * `session` - The shared study session
///
/// ### Returns
///
/// The card, the remaining counts, how many answer buttons to show and the
/// next interval for each grade. `card` is null when the day's work is done.
#[instrument(skip(session))]
pub async fn next_card_handler(
    State(session): State<SharedSession>,
) -> Result<Json<NextCardDto>, ApiError> {
    let mut session = session.lock().await;

    if session.current.is_none() {
        session.current = session.col.pop_card()?;
    }

    let col = &session.col;
    let response = match &session.current {
        Some(card) => {
            debug!(card_id = card.id, "Presenting card");
            NextCardDto {
                card: Some(card.clone()),
                counts: col.counts(Some(card)),
                buttons: col.answer_buttons(card),
                intervals: Grade::ALL.iter().map(|grade| col.next_interval(card, *grade)).collect(),
            }
        }
        None => {
            debug!("No cards left to study");
            NextCardDto { card: None, counts: col.counts(None), buttons: 0, intervals: Vec::new() }
        }
    };

    Ok(Json(response))
}

/// Handler for answering the card in hand
///
/// This function handles POST requests to `/study/answer`.
///
/// ### Arguments
///
/// * `session` - The shared study session
/// * `payload` - The card being answered and the grade given
///
/// ### Returns
///
/// The rescheduled card and the updated counts as JSON
///
/// ### Errors
///
/// `NoCurrentCard` if no card was handed out or a different card is named,
/// and a bad request for grades outside 1 to 4
#[instrument(skip(session, payload), fields(card_id = payload.card_id, grade = payload.grade))]
pub async fn answer_card_handler(
    State(session): State<SharedSession>,
    Json(payload): Json<AnswerDto>,
) -> Result<Json<AnswerResultDto>, ApiError> {
    let grade = Grade::try_from(payload.grade)
        .map_err(|_| ApiError::InvalidGrade(format!("Grade must be between 1 and 4, got {}", payload.grade)))?;

    let mut session = session.lock().await;
    let mut card = match session.current.take() {
        Some(card) if card.id == payload.card_id => card,
        other => {
            session.current = other;
            return Err(ApiError::NoCurrentCard);
        }
    };

    if let Err(err) = session.col.answer_card(&mut card, grade) {
        // The card stays in hand so the answer can be retried
        session.current = Some(card);
        return Err(err.into());
    }

    info!(queue = ?card.queue, due = card.due, ivl = card.ivl, "Answered card");
    let counts = session.col.counts(None);
    Ok(Json(AnswerResultDto { card, counts }))
}

/// Handler for the current study counts
///
/// This function handles GET requests to `/study/counts`.
///
/// ### Arguments
///
/// * `session` - The shared study session
///
/// ### Returns
///
/// The new, learning and review counts of the selected deck, including the
/// card in hand
#[instrument(skip(session))]
pub async fn study_counts_handler(
    State(session): State<SharedSession>,
) -> Result<Json<Counts>, ApiError> {
    let mut session = session.lock().await;
    session.col.refresh_queues()?;

    let counts = session.col.counts(session.current.as_ref());
    Ok(Json(counts))
}
