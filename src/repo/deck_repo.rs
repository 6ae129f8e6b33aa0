use crate::db::with_retry;
use crate::models::{Deck, DeckConfig, DeckConfigId, DeckId};
use crate::schema::{deck_config, decks};
use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::{debug, instrument, warn};

/// Loads every deck
///
/// Rows whose JSON body cannot be parsed are skipped with a warning, so one
/// corrupt deck does not make the whole collection unusable.
#[instrument(skip(conn))]
pub fn all_decks(conn: &mut SqliteConnection) -> Result<Vec<Deck>> {
    let rows: Vec<(i64, String, String)> = decks::table
        .select((decks::id, decks::name, decks::data))
        .order(decks::id.asc())
        .load(conn)?;

    let mut result = Vec::with_capacity(rows.len());
    for (id, name, data) in rows {
        match serde_json::from_str::<Deck>(&data) {
            Ok(mut deck) => {
                deck.id = id;
                deck.name = name;
                result.push(deck);
            }
            Err(e) => warn!("Skipping unreadable deck {}: {}", id, e),
        }
    }
    debug!("Loaded {} decks", result.len());
    Ok(result)
}

/// Writes a deck, inserting it if it does not exist
#[instrument(skip(conn, deck), fields(deck_id = %deck.id))]
pub fn save_deck(conn: &mut SqliteConnection, deck: &Deck) -> Result<()> {
    let data = serde_json::to_string(deck).context("Failed to encode deck")?;
    with_retry(|| {
        diesel::replace_into(decks::table)
            .values((
                decks::id.eq(deck.id),
                decks::name.eq(&deck.name),
                decks::mtime.eq(deck.mtime),
                decks::usn.eq(deck.usn),
                decks::data.eq(&data),
            ))
            .execute(conn)
    })?;
    Ok(())
}

#[instrument(skip(conn), fields(deck_id = %deck_id))]
pub fn delete_deck(conn: &mut SqliteConnection, deck_id: DeckId) -> Result<()> {
    with_retry(|| diesel::delete(decks::table.find(deck_id)).execute(conn))?;
    Ok(())
}

/// Loads every deck config, repairing unusable values
#[instrument(skip(conn))]
pub fn all_deck_configs(conn: &mut SqliteConnection) -> Result<Vec<DeckConfig>> {
    let rows: Vec<(i64, String, String)> = deck_config::table
        .select((deck_config::id, deck_config::name, deck_config::config))
        .order(deck_config::id.asc())
        .load(conn)?;

    let mut result = Vec::with_capacity(rows.len());
    for (id, name, body) in rows {
        match serde_json::from_str::<DeckConfig>(&body) {
            Ok(mut conf) => {
                conf.id = id;
                conf.name = name;
                result.push(conf.validated());
            }
            Err(e) => warn!("Skipping unreadable deck config {}: {}", id, e),
        }
    }
    Ok(result)
}

#[instrument(skip(conn, conf), fields(config_id = %conf.id))]
pub fn save_deck_config(conn: &mut SqliteConnection, conf: &DeckConfig) -> Result<()> {
    let body = serde_json::to_string(conf).context("Failed to encode deck config")?;
    with_retry(|| {
        diesel::replace_into(deck_config::table)
            .values((
                deck_config::id.eq(conf.id),
                deck_config::name.eq(&conf.name),
                deck_config::mtime.eq(conf.mtime),
                deck_config::usn.eq(conf.usn),
                deck_config::config.eq(&body),
            ))
            .execute(conn)
    })?;
    Ok(())
}

#[instrument(skip(conn), fields(config_id = %config_id))]
pub fn delete_deck_config(conn: &mut SqliteConnection, config_id: DeckConfigId) -> Result<()> {
    with_retry(|| diesel::delete(deck_config::table.find(config_id)).execute(conn))?;
    Ok(())
}
