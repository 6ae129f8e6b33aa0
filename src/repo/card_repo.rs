use crate::db::with_retry;
use crate::models::{Card, CardId, CardType, Queue};
use crate::schema::cards;
use anyhow::{Result, anyhow};
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use tracing::{debug, instrument};

use super::{CardFilter, CardOrder, CardUpdate, DueBound, QueueChange};

/// Row layout of the `cards` table
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = cards)]
#[diesel(check_for_backend(Sqlite))]
pub(crate) struct CardRow {
    id: i64,
    nid: i64,
    did: i64,
    ord: i32,
    mtime: i64,
    usn: i32,
    ctype: i32,
    queue: i32,
    due: i64,
    ivl: i32,
    factor: i32,
    reps: i32,
    lapses: i32,
    left: i32,
    odue: i64,
    odid: i64,
    flags: i32,
    data: String,
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl TryFrom<CardRow> for Card {
    type Error = anyhow::Error;

    fn try_from(row: CardRow) -> Result<Self> {
        let mut card = Card::new(row.id, row.nid, row.did, to_u32(row.ord), row.due);
        card.mtime = row.mtime;
        card.usn = row.usn;
        card.ctype = CardType::try_from(row.ctype).map_err(|e| anyhow!("card {}: {}", row.id, e))?;
        card.queue = Queue::try_from(row.queue).map_err(|e| anyhow!("card {}: {}", row.id, e))?;
        card.ivl = to_u32(row.ivl);
        card.factor = row.factor;
        card.reps = to_u32(row.reps);
        card.lapses = to_u32(row.lapses);
        card.left = to_u32(row.left);
        card.odue = row.odue;
        card.odid = row.odid;
        card.flags = row.flags;
        card.data = row.data;
        Ok(card)
    }
}

impl From<&Card> for CardRow {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            nid: card.nid,
            did: card.did,
            ord: to_i32(card.ord),
            mtime: card.mtime,
            usn: card.usn,
            ctype: card.ctype.code(),
            queue: card.queue.code(),
            due: card.due,
            ivl: to_i32(card.ivl),
            factor: card.factor,
            reps: to_i32(card.reps),
            lapses: to_i32(card.lapses),
            left: to_i32(card.left),
            odue: card.odue,
            odid: card.odid,
            flags: card.flags,
            data: card.data.clone(),
        }
    }
}

fn rows_to_cards(rows: Vec<CardRow>) -> Result<Vec<Card>> {
    rows.into_iter().map(Card::try_from).collect()
}

/// Builds a boxed query over `cards` restricted by a filter
fn filtered_query(filter: &CardFilter) -> cards::BoxedQuery<'static, Sqlite> {
    let mut query = cards::table.into_boxed();

    if let Some(ids) = &filter.ids {
        query = query.filter(cards::id.eq_any(ids.clone()));
    }
    if let Some(deck_ids) = &filter.deck_ids {
        query = query.filter(cards::did.eq_any(deck_ids.clone()));
    }
    if let Some(note_ids) = &filter.note_ids {
        query = query.filter(cards::nid.eq_any(note_ids.clone()));
    }
    if let Some(exclude) = filter.exclude_id {
        query = query.filter(cards::id.ne(exclude));
    }
    if let Some(queues) = &filter.queues {
        let codes: Vec<i32> = queues.iter().map(|q| q.code()).collect();
        query = query.filter(cards::queue.eq_any(codes));
    }
    if let Some(types) = &filter.types {
        let codes: Vec<i32> = types.iter().map(|t| t.code()).collect();
        query = query.filter(cards::ctype.eq_any(codes));
    }
    match filter.due {
        Some(DueBound::Before(due)) => query = query.filter(cards::due.lt(due)),
        Some(DueBound::AtOrBefore(due)) => query = query.filter(cards::due.le(due)),
        Some(DueBound::AtOrAfter(due)) => query = query.filter(cards::due.ge(due)),
        None => {}
    }
    match filter.in_filtered_deck {
        Some(true) => query = query.filter(cards::odid.ne(0)),
        Some(false) => query = query.filter(cards::odid.eq(0)),
        None => {}
    }
    if let Some(original) = &filter.original_deck_ids {
        query = query.filter(cards::odid.eq_any(original.clone()));
    }
    if let Some(home) = &filter.home_deck_ids {
        query = query.filter(cards::did.eq_any(home.clone()).or(cards::odid.eq_any(home.clone())));
    }
    if let Some(excluded) = &filter.excluded_queues {
        let codes: Vec<i32> = excluded.iter().map(|q| q.code()).collect();
        query = query.filter(cards::queue.ne_all(codes));
    }
    query
}

fn ordered(query: cards::BoxedQuery<'static, Sqlite>, order: CardOrder) -> cards::BoxedQuery<'static, Sqlite> {
    match order {
        CardOrder::Unordered => query,
        CardOrder::Due => query.order((cards::due.asc(), cards::ord.asc(), cards::id.asc())),
        CardOrder::Id => query.order(cards::id.asc()),
    }
}

fn limited(query: cards::BoxedQuery<'static, Sqlite>, limit: Option<usize>) -> cards::BoxedQuery<'static, Sqlite> {
    match limit {
        Some(limit) => query.limit(i64::try_from(limit).unwrap_or(i64::MAX)),
        None => query,
    }
}

/// Retrieves a card by its id
///
/// ### Returns
///
/// A Result containing an Option with the Card if found, or None if not found
///
/// ### Errors
///
/// Returns an error if the query fails or the stored row has invalid codes
#[instrument(skip(conn), fields(card_id = %card_id))]
pub fn get_card(conn: &mut SqliteConnection, card_id: CardId) -> Result<Option<Card>> {
    let row = cards::table
        .find(card_id)
        .select(CardRow::as_select())
        .first::<CardRow>(conn)
        .optional()?;

    match row {
        Some(row) => Ok(Some(Card::try_from(row)?)),
        None => {
            debug!("Card not found");
            Ok(None)
        }
    }
}

/// Inserts a new card
#[instrument(skip(conn, card), fields(card_id = %card.id, note_id = %card.nid, deck_id = %card.did))]
pub fn insert_card(conn: &mut SqliteConnection, card: &Card) -> Result<()> {
    let row = CardRow::from(card);
    with_retry(|| diesel::insert_into(cards::table).values(&row).execute(conn))?;
    debug!("Inserted card");
    Ok(())
}

/// Writes every column of a card, inserting it if it does not exist
#[instrument(skip(conn, card), fields(card_id = %card.id, queue = card.queue.code()))]
pub fn save_card(conn: &mut SqliteConnection, card: &Card) -> Result<()> {
    let row = CardRow::from(card);
    with_retry(|| diesel::replace_into(cards::table).values(&row).execute(conn))?;
    Ok(())
}

/// Deletes cards by id
///
/// ### Returns
///
/// The number of deleted rows
#[instrument(skip(conn, ids), fields(count = ids.len()))]
pub fn delete_cards(conn: &mut SqliteConnection, ids: &[CardId]) -> Result<usize> {
    let deleted = with_retry(|| {
        diesel::delete(cards::table.filter(cards::id.eq_any(ids))).execute(conn)
    })?;
    debug!("Deleted {} cards", deleted);
    Ok(deleted)
}

/// Counts cards matching a filter, stopping at `limit` when given
#[instrument(skip(conn))]
pub fn count_cards(conn: &mut SqliteConnection, filter: &CardFilter, limit: Option<usize>) -> Result<usize> {
    let count = match limit {
        Some(_) => limited(filtered_query(filter), limit)
            .select(cards::id)
            .load::<i64>(conn)?
            .len(),
        None => {
            let total: i64 = filtered_query(filter).count().get_result(conn)?;
            usize::try_from(total).unwrap_or(0)
        }
    };
    Ok(count)
}

/// Loads cards matching a filter
#[instrument(skip(conn))]
pub fn query_cards(
    conn: &mut SqliteConnection,
    filter: &CardFilter,
    order: CardOrder,
    limit: Option<usize>,
) -> Result<Vec<Card>> {
    let rows = limited(ordered(filtered_query(filter), order), limit)
        .select(CardRow::as_select())
        .load::<CardRow>(conn)?;
    rows_to_cards(rows)
}

/// Loads the ids of cards matching a filter
#[instrument(skip(conn))]
pub fn query_card_ids(
    conn: &mut SqliteConnection,
    filter: &CardFilter,
    order: CardOrder,
    limit: Option<usize>,
) -> Result<Vec<CardId>> {
    let ids = limited(ordered(filtered_query(filter), order), limit)
        .select(cards::id)
        .load::<i64>(conn)?;
    Ok(ids)
}

/// Applies a queue change to every card matching a filter
///
/// ### Returns
///
/// The number of updated cards
#[instrument(skip(conn))]
pub fn bulk_update_cards(conn: &mut SqliteConnection, filter: &CardFilter, update: &CardUpdate) -> Result<usize> {
    let ids = filtered_query(filter).select(cards::id).load::<i64>(conn)?;
    if ids.is_empty() {
        return Ok(0);
    }
    let updated = with_retry(|| match update.queue {
        QueueChange::Set(queue) => diesel::update(cards::table.filter(cards::id.eq_any(&ids)))
            .set((
                cards::queue.eq(queue.code()),
                cards::mtime.eq(update.mtime),
                cards::usn.eq(update.usn),
            ))
            .execute(conn),
        QueueChange::RestoreFromType => diesel::update(cards::table.filter(cards::id.eq_any(&ids)))
            .set((
                cards::queue.eq(cards::ctype),
                cards::mtime.eq(update.mtime),
                cards::usn.eq(update.usn),
            ))
            .execute(conn),
    })?;
    debug!("Updated queue of {} cards", updated);
    Ok(updated)
}

/// Largest card id in use, or 0
pub fn max_card_id(conn: &mut SqliteConnection) -> Result<i64> {
    let max: Option<i64> = cards::table.select(diesel::dsl::max(cards::id)).first(conn)?;
    Ok(max.unwrap_or(0))
}

/// Largest due value among new cards, or 0
pub fn max_new_position(conn: &mut SqliteConnection) -> Result<i64> {
    let max: Option<i64> = cards::table
        .filter(cards::ctype.eq(CardType::New.code()))
        .select(diesel::dsl::max(cards::due))
        .first(conn)?;
    Ok(max.unwrap_or(0))
}

#[cfg(test)]
mod tests;
