//! Projection of the note collection into the visible, filterable list,
//! plus the drag-to-reorder gesture state.

use crate::models::{Note, NoteId};

/// One row of the rendered note list
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub id: NoteId,
    pub title: String,
    pub date: String,
    pub active: bool,
}

/// Does `note` match `query` (case-insensitive substring of title or content)?
pub fn matches_query(note: &Note, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    note.title.to_lowercase().contains(&needle) || note.content.to_lowercase().contains(&needle)
}

/// Filter the collection by `query`, preserving collection order
pub fn filter_notes<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    notes.iter().filter(|n| matches_query(n, query)).collect()
}

/// Build the visible list entries for the given query and active note
pub fn render_entries(notes: &[Note], active: Option<NoteId>, query: &str) -> Vec<ListEntry> {
    filter_notes(notes, query)
        .into_iter()
        .map(|note| ListEntry {
            id: note.id,
            title: note.display_title().to_string(),
            date: note.display_date(),
            active: Some(note.id) == active,
        })
        .collect()
}

/// State of a drag-to-reorder gesture in the list
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DragState {
    dragged: Option<NoteId>,
    over: Option<NoteId>,
}

impl DragState {
    /// Pick up an entry
    pub fn start(&mut self, id: NoteId) {
        self.dragged = Some(id);
        self.over = None;
    }

    /// The pointer entered another entry while dragging
    pub fn enter(&mut self, id: NoteId) {
        if self.dragged.is_some() {
            self.over = Some(id);
        }
    }

    /// The pointer left the hovered entry
    pub fn leave(&mut self, id: NoteId) {
        if self.over == Some(id) {
            self.over = None;
        }
    }

    /// Drop on `target`; yields the `(from, to)` pair to reorder, or `None`
    /// when nothing is being dragged or the entry is dropped on itself.
    /// The gesture ends either way.
    pub fn drop_on(&mut self, target: NoteId) -> Option<(NoteId, NoteId)> {
        let dragged = self.dragged.take();
        self.over = None;
        match dragged {
            Some(from) if from != target => Some((from, target)),
            _ => None,
        }
    }

    /// Gesture ended without a drop
    pub fn end(&mut self) {
        self.dragged = None;
        self.over = None;
    }

    pub fn dragged(&self) -> Option<NoteId> {
        self.dragged
    }

    /// Entry currently highlighted as drop target
    pub fn over(&self) -> Option<NoteId> {
        self.over
    }

    pub fn is_dragging(&self) -> bool {
        self.dragged.is_some()
    }
}
