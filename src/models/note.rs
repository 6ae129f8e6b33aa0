use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NoteId;

/// Separator between fields in the persisted `flds` column
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// A fact with ordered fields and a tag set; owns one card per template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Globally unique id used when exchanging notes between collections
    pub guid: String,
    /// Note type id
    pub mid: i64,
    pub mtime: i64,
    pub usn: i32,
    tags: Vec<String>,
    pub fields: Vec<String>,
    pub flags: i32,
    pub data: String,
}

impl Note {
    /// Creates a note with a fresh guid
    ///
    /// ### Arguments
    ///
    /// * `fields` - The field contents, in note-type order
    /// * `tags` - Initial tags; duplicates (ignoring case) are dropped
    pub fn new(fields: Vec<String>, tags: Vec<String>) -> Self {
        let mut note = Self {
            id: 0,
            guid: Uuid::new_v4().simple().to_string(),
            mid: 0,
            mtime: 0,
            usn: 0,
            tags: Vec::new(),
            fields,
            flags: 0,
            data: String::new(),
        };
        for tag in tags {
            note.add_tag(&tag);
        }
        note
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Case-insensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Adds a tag unless an equal one (ignoring case) is already present
    ///
    /// ### Returns
    ///
    /// `true` if the tag was added
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || tag.contains(char::is_whitespace) || self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Removes a tag, ignoring case
    ///
    /// ### Returns
    ///
    /// `true` if a tag was removed
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        self.tags.len() != before
    }

    /// Tags in their persisted form: space separated, with surrounding spaces
    pub fn tags_string(&self) -> String {
        if self.tags.is_empty() {
            String::new()
        } else {
            format!(" {} ", self.tags.join(" "))
        }
    }

    /// Replaces the tags with those parsed from a persisted tag string
    pub fn set_tags_from_str(&mut self, tags: &str) {
        self.tags.clear();
        for tag in tags.split_whitespace() {
            self.add_tag(tag);
        }
    }

    /// Fields joined with the field separator
    pub fn joined_fields(&self) -> String {
        let sep = FIELD_SEPARATOR.to_string();
        self.fields.join(&sep)
    }

    pub fn set_fields_from_joined(&mut self, flds: &str) {
        self.fields = flds.split(FIELD_SEPARATOR).map(str::to_string).collect();
    }

    /// The field used for sorting and duplicate checks
    pub fn sort_field(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }
}
