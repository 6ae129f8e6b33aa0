use crate::db::with_retry;
use crate::models::CollectionConf;
use crate::schema::{col, graves};
use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::{instrument, warn};

/// The single row of collection-wide state
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    /// Collection creation time, epoch seconds at the start of a day
    pub crt: i64,
    pub mtime: i64,
    pub usn: i32,
    pub conf: CollectionConf,
}

/// Kind of object recorded in the graves ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraveKind {
    Card,
    Note,
    Deck,
}

impl GraveKind {
    pub fn code(self) -> i32 {
        match self {
            GraveKind::Card => 0,
            GraveKind::Note => 1,
            GraveKind::Deck => 2,
        }
    }
}

/// Loads the collection row, if the collection has been initialised
#[instrument(skip(conn))]
pub fn load_collection(conn: &mut SqliteConnection) -> Result<Option<CollectionRecord>> {
    let row: Option<(i64, i64, i32, String)> = col::table
        .select((col::crt, col::mtime, col::usn, col::conf))
        .first(conn)
        .optional()?;

    Ok(row.map(|(crt, mtime, usn, conf)| {
        let conf = serde_json::from_str(&conf).unwrap_or_else(|e| {
            warn!("Collection settings unreadable, using defaults: {}", e);
            CollectionConf::default()
        });
        CollectionRecord { crt, mtime, usn, conf }
    }))
}

#[instrument(skip(conn, record))]
pub fn save_collection(conn: &mut SqliteConnection, record: &CollectionRecord) -> Result<()> {
    let conf = serde_json::to_string(&record.conf).context("Failed to encode collection settings")?;
    with_retry(|| {
        diesel::replace_into(col::table)
            .values((
                col::id.eq(1),
                col::crt.eq(record.crt),
                col::mtime.eq(record.mtime),
                col::usn.eq(record.usn),
                col::conf.eq(&conf),
            ))
            .execute(conn)
    })?;
    Ok(())
}

/// Records a removed object so a later sync can propagate the removal
#[instrument(skip(conn))]
pub fn add_grave(conn: &mut SqliteConnection, usn: i32, oid: i64, kind: GraveKind) -> Result<()> {
    with_retry(|| {
        diesel::insert_or_ignore_into(graves::table)
            .values((graves::usn.eq(usn), graves::oid.eq(oid), graves::kind.eq(kind.code())))
            .execute(conn)
    })?;
    Ok(())
}

/// Number of recorded graves of a kind
pub fn count_graves(conn: &mut SqliteConnection, kind: GraveKind) -> Result<usize> {
    let count: i64 = graves::table
        .filter(graves::kind.eq(kind.code()))
        .count()
        .get_result(conn)?;
    Ok(usize::try_from(count).unwrap_or(0))
}
