use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use crate::models::{CardId, Grade, ReviewLogEntry, ReviewType};
use crate::schema::revlog;
use anyhow::{Result, anyhow};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::{Sqlite, SqliteConnection};
use tracing::{debug, instrument, warn};

/// Pause before retrying an insert whose id was already taken
const COLLISION_DELAY: Duration = Duration::from_millis(10);

/// Keeps `IN (...)` lists under SQLite's bound-parameter limit
const MAX_IDS_PER_QUERY: usize = 500;

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = revlog)]
#[diesel(check_for_backend(Sqlite))]
struct RevlogRow {
    id: i64,
    cid: i64,
    usn: i32,
    ease: i32,
    ivl: i64,
    last_ivl: i64,
    factor: i32,
    time: i64,
    review_type: i32,
}

impl From<&ReviewLogEntry> for RevlogRow {
    fn from(entry: &ReviewLogEntry) -> Self {
        Self {
            id: entry.id,
            cid: entry.cid,
            usn: entry.usn,
            ease: i32::from(entry.ease.ease()),
            ivl: entry.ivl,
            last_ivl: entry.last_ivl,
            factor: entry.factor,
            time: entry.time,
            review_type: i32::from(entry.review_type),
        }
    }
}

impl TryFrom<RevlogRow> for ReviewLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: RevlogRow) -> Result<Self> {
        let ease = u8::try_from(row.ease)
            .ok()
            .and_then(|e| Grade::try_from(e).ok())
            .ok_or_else(|| anyhow!("revlog {}: invalid ease {}", row.id, row.ease))?;
        Ok(Self {
            id: row.id,
            cid: row.cid,
            usn: row.usn,
            ease,
            ivl: row.ivl,
            last_ivl: row.last_ivl,
            factor: row.factor,
            time: row.time,
            review_type: ReviewType::try_from(row.review_type)?,
        })
    }
}

fn is_unique_violation(err: &DieselError) -> bool {
    matches!(err, DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}

/// Appends a review log entry
///
/// Log ids are answer timestamps, so two fast answers can collide. On a
/// collision the insert is retried once, after a short pause, with the next
/// free millisecond.
///
/// ### Returns
///
/// The id the entry was stored under
///
/// ### Errors
///
/// Returns an error if the insert fails for any other reason, or collides twice
#[instrument(skip(conn, entry), fields(card_id = %entry.cid))]
pub fn append_review_log(conn: &mut SqliteConnection, entry: &ReviewLogEntry) -> Result<i64> {
    let mut row = RevlogRow::from(entry);
    match diesel::insert_into(revlog::table).values(&row).execute(conn) {
        Ok(_) => {
            debug!("Logged review {}", row.id);
            Ok(row.id)
        }
        Err(err) if is_unique_violation(&err) => {
            warn!("Review log id {} already taken, retrying", row.id);
            thread::sleep(COLLISION_DELAY);
            row.id += 1;
            diesel::insert_into(revlog::table).values(&row).execute(conn)?;
            Ok(row.id)
        }
        Err(err) => Err(err.into()),
    }
}

/// Review history of a card, oldest first
#[instrument(skip(conn), fields(card_id = %card_id))]
pub fn review_logs_for_card(conn: &mut SqliteConnection, card_id: CardId) -> Result<Vec<ReviewLogEntry>> {
    let rows = revlog::table
        .filter(revlog::cid.eq(card_id))
        .order(revlog::id.asc())
        .select(RevlogRow::as_select())
        .load::<RevlogRow>(conn)?;
    rows.into_iter().map(ReviewLogEntry::try_from).collect()
}

/// Id of the latest review of each card that has been reviewed
#[instrument(skip(conn, card_ids), fields(count = card_ids.len()))]
pub fn last_review_ids(conn: &mut SqliteConnection, card_ids: &[CardId]) -> Result<HashMap<CardId, i64>> {
    let mut latest = HashMap::new();
    for chunk in card_ids.chunks(MAX_IDS_PER_QUERY) {
        let rows: Vec<(i64, Option<i64>)> = revlog::table
            .filter(revlog::cid.eq_any(chunk))
            .group_by(revlog::cid)
            .select((revlog::cid, diesel::dsl::max(revlog::id)))
            .load(conn)?;
        latest.extend(rows.into_iter().filter_map(|(cid, id)| id.map(|id| (cid, id))));
    }
    Ok(latest)
}

/// Largest review log id in use, or 0
pub fn max_revlog_id(conn: &mut SqliteConnection) -> Result<i64> {
    let max: Option<i64> = revlog::table.select(diesel::dsl::max(revlog::id)).first(conn)?;
    Ok(max.unwrap_or(0))
}
