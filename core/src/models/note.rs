use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a note: milliseconds since the epoch at creation time,
/// bumped where needed so that ids stay unique and increasing.
pub type NoteId = u64;

/// Label shown in place of an empty or whitespace-only title
pub const UNTITLED_LABEL: &str = "Untitled Page";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    /// Serialized rich-text markup, see [`crate::richtext`]
    #[serde(default)]
    pub content: String,
    #[serde(with = "super::iso8601", default = "super::now")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create an empty note with the given id
    pub fn blank(id: NoteId) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            updated_at: super::now(),
        }
    }

    /// Update the modified timestamp
    pub fn touch(&mut self) {
        self.updated_at = super::now();
    }

    /// Title for list display, falling back to the placeholder label
    pub fn display_title(&self) -> &str {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            UNTITLED_LABEL
        } else {
            trimmed
        }
    }

    /// Human-readable last-modified date/time in local time, e.g. `Oct 17, 02:30 PM`
    pub fn display_date(&self) -> String {
        self.updated_at
            .with_timezone(&Local)
            .format("%b %-d, %I:%M %p")
            .to_string()
    }
}
