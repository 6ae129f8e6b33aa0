use crate::db::with_retry;
use crate::models::{Note, NoteId};
use crate::schema::{cards, notes};
use anyhow::Result;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use tracing::{debug, instrument};

/// Row layout of the `notes` table
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = notes)]
#[diesel(check_for_backend(Sqlite))]
pub(crate) struct NoteRow {
    id: i64,
    guid: String,
    mid: i64,
    mtime: i64,
    usn: i32,
    tags: String,
    flds: String,
    sfld: String,
    flags: i32,
    data: String,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        let mut note = Note::new(Vec::new(), Vec::new());
        note.id = row.id;
        note.guid = row.guid;
        note.mid = row.mid;
        note.mtime = row.mtime;
        note.usn = row.usn;
        note.set_tags_from_str(&row.tags);
        note.set_fields_from_joined(&row.flds);
        note.flags = row.flags;
        note.data = row.data;
        note
    }
}

impl From<&Note> for NoteRow {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            guid: note.guid.clone(),
            mid: note.mid,
            mtime: note.mtime,
            usn: note.usn,
            tags: note.tags_string(),
            flds: note.joined_fields(),
            sfld: note.sort_field().to_string(),
            flags: note.flags,
            data: note.data.clone(),
        }
    }
}

/// Retrieves a note by its id
#[instrument(skip(conn), fields(note_id = %note_id))]
pub fn get_note(conn: &mut SqliteConnection, note_id: NoteId) -> Result<Option<Note>> {
    let row = notes::table
        .find(note_id)
        .select(NoteRow::as_select())
        .first::<NoteRow>(conn)
        .optional()?;
    Ok(row.map(Note::from))
}

/// Retrieves several notes; missing ids are skipped
pub fn get_notes(conn: &mut SqliteConnection, note_ids: &[NoteId]) -> Result<Vec<Note>> {
    let rows = notes::table
        .filter(notes::id.eq_any(note_ids))
        .select(NoteRow::as_select())
        .load::<NoteRow>(conn)?;
    Ok(rows.into_iter().map(Note::from).collect())
}

/// Loads every note in the collection
pub fn all_notes(conn: &mut SqliteConnection) -> Result<Vec<Note>> {
    let rows = notes::table
        .order(notes::id.asc())
        .select(NoteRow::as_select())
        .load::<NoteRow>(conn)?;
    Ok(rows.into_iter().map(Note::from).collect())
}

/// Writes a note, inserting it if it does not exist
#[instrument(skip(conn, note), fields(note_id = %note.id))]
pub fn save_note(conn: &mut SqliteConnection, note: &Note) -> Result<()> {
    let row = NoteRow::from(note);
    with_retry(|| diesel::replace_into(notes::table).values(&row).execute(conn))?;
    debug!("Saved note");
    Ok(())
}

/// Deletes notes by id
#[instrument(skip(conn, ids), fields(count = ids.len()))]
pub fn delete_notes(conn: &mut SqliteConnection, ids: &[NoteId]) -> Result<usize> {
    let deleted = with_retry(|| diesel::delete(notes::table.filter(notes::id.eq_any(ids))).execute(conn))?;
    Ok(deleted)
}

/// Of the given notes, those that no longer have any card
pub fn notes_without_cards(conn: &mut SqliteConnection, ids: &[NoteId]) -> Result<Vec<NoteId>> {
    let with_cards: Vec<i64> = cards::table
        .filter(cards::nid.eq_any(ids))
        .select(cards::nid)
        .distinct()
        .load(conn)?;
    Ok(ids.iter().copied().filter(|id| !with_cards.contains(id)).collect())
}

/// Largest note id in use, or 0
pub fn max_note_id(conn: &mut SqliteConnection) -> Result<i64> {
    let max: Option<i64> = notes::table.select(diesel::dsl::max(notes::id)).first(conn)?;
    Ok(max.unwrap_or(0))
}
