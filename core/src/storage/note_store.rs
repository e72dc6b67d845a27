use super::KeyValueStore;
use crate::models::{Note, NoteId};
use crate::{Error, Result};
use chrono::Utc;

/// Key under which the serialized note collection lives
pub const NOTES_KEY: &str = "pagenote-notes";

/// Ordered collection of notes, persisted in full after every mutation.
///
/// The collection is never empty once opened: deleting the last note
/// synthesizes a blank replacement. Order is user-controlled.
pub struct NoteStore<S: KeyValueStore> {
    backend: S,
    notes: Vec<Note>,
    warnings: Vec<String>,
    /// Highest id ever issued or loaded, deleted notes included
    last_id: NoteId,
}

impl<S: KeyValueStore> NoteStore<S> {
    /// Load the collection from `backend`, synthesizing a blank note on first run
    pub fn open(backend: S) -> Result<Self> {
        let notes = match backend.get(NOTES_KEY)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<Vec<Note>>(&raw)?,
            _ => Vec::new(),
        };
        log::info!("Loaded {} notes", notes.len());

        let last_id = notes.iter().map(|n| n.id).max().unwrap_or(0);
        let mut store = Self {
            backend,
            notes,
            warnings: Vec::new(),
            last_id,
        };
        if store.notes.is_empty() {
            store.create();
        }
        Ok(store)
    }

    /// All notes in display order
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Get a note by ID
    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Index of a note in the ordered collection
    pub fn position(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    /// ID of the first note in display order
    pub fn first_id(&self) -> Option<NoteId> {
        self.notes.first().map(|n| n.id)
    }

    /// Count total notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Insert a new blank note at the front and persist
    pub fn create(&mut self) -> NoteId {
        let note = Note::blank(self.next_id());
        let id = note.id;
        self.notes.insert(0, note);
        log::info!("Created note {}", id);
        self.persist();
        id
    }

    /// Remove a note and persist. Returns false if the id is unknown.
    ///
    /// When the collection becomes empty a blank replacement is created.
    pub fn delete(&mut self, id: NoteId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.notes.remove(index);
        log::info!("Deleted note {}", id);
        if self.notes.is_empty() {
            self.create();
        } else {
            self.persist();
        }
        true
    }

    /// Move `from` to the position currently held by `to` (splice-remove,
    /// then splice-insert at `to`'s original index). No-op when the ids are
    /// equal or either is unknown.
    pub fn reorder(&mut self, from: NoteId, to: NoteId) -> bool {
        if from == to {
            return false;
        }
        let (Some(from_index), Some(to_index)) = (self.position(from), self.position(to)) else {
            return false;
        };
        let moved = self.notes.remove(from_index);
        self.notes.insert(to_index, moved);
        log::info!("Moved note {} from {} to {}", from, from_index, to_index);
        self.persist();
        true
    }

    /// Replace a note's title and content, refresh its timestamp and persist
    pub fn update(&mut self, id: NoteId, title: &str, content: &str) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        note.title = title.to_string();
        note.content = content.to_string();
        note.touch();
        self.persist();
        true
    }

    /// Drain storage warnings accumulated since the last call
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Write the full collection. Failures keep the in-memory state and are
    /// queued as warnings.
    fn persist(&mut self) {
        if let Err(err) = self.try_persist() {
            log::warn!("Could not save notes: {}", err);
            self.warnings.push(format!("Could not save notes: {}", err));
        }
    }

    fn try_persist(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.notes)?;
        self.backend.set(NOTES_KEY, &json).map_err(|e| match e {
            Error::Storage(_) => e,
            other => Error::Storage(other.to_string()),
        })
    }

    fn next_id(&mut self) -> NoteId {
        let now = Utc::now().timestamp_millis().max(0) as NoteId;
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::tempdir;

    fn store_with(n: usize) -> NoteStore<MemoryStore> {
        let mut store = NoteStore::open(MemoryStore::new()).unwrap();
        for _ in 1..n {
            store.create();
        }
        store
    }

    fn ids(store: &NoteStore<MemoryStore>) -> Vec<NoteId> {
        store.notes().iter().map(|n| n.id).collect()
    }

    #[test]
    fn test_first_run_synthesizes_note() {
        let store = NoteStore::open(MemoryStore::new()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.notes()[0].title.is_empty());
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn test_create_inserts_at_front() {
        let mut store = store_with(1);
        let first = store.first_id().unwrap();
        let second = store.create();
        assert_eq!(ids(&store), vec![second, first]);
        assert!(second > first);
    }

    #[test]
    fn test_ids_unique_and_increasing() {
        let mut store = store_with(1);
        let mut last = store.first_id().unwrap();
        for _ in 0..20 {
            let id = store.create();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_delete_last_note_leaves_one_blank() {
        let mut store = store_with(1);
        let only = store.first_id().unwrap();
        assert!(store.delete(only));
        assert_eq!(store.len(), 1);
        let replacement = &store.notes()[0];
        assert_ne!(replacement.id, only);
        assert!(replacement.title.is_empty());
        assert!(replacement.content.is_empty());
    }

    #[test]
    fn test_replacement_ids_never_reuse_deleted_ones() {
        let mut store = store_with(1);
        let mut deleted = Vec::new();
        for _ in 0..10 {
            let only = store.first_id().unwrap();
            deleted.push(only);
            assert!(store.delete(only));
            let replacement = store.first_id().unwrap();
            assert!(deleted.iter().all(|&id| id < replacement));
        }
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut store = store_with(2);
        let before = ids(&store);
        assert!(!store.delete(12345));
        assert_eq!(ids(&store), before);
    }

    #[test]
    fn test_reorder_matches_splice() {
        let mut store = store_with(5);
        let original = ids(&store);

        for from in 0..5 {
            for to in 0..5 {
                let mut expected = original.clone();
                if from != to {
                    let moved = expected.remove(from);
                    expected.insert(to, moved);
                }

                let mut candidate = store_with(1);
                candidate.notes = store.notes.clone();
                candidate.reorder(original[from], original[to]);
                assert_eq!(ids(&candidate), expected, "from {} to {}", from, to);
            }
        }
        store.reorder(original[0], original[0]);
        assert_eq!(ids(&store), original);
    }

    #[test]
    fn test_reorder_back_and_forth_restores_adjacent_order() {
        let mut store = store_with(4);
        let original = ids(&store);
        store.reorder(original[1], original[2]);
        store.reorder(original[2], original[1]);
        assert_eq!(ids(&store), original);
    }

    #[test]
    fn test_reorder_unknown_is_noop() {
        let mut store = store_with(3);
        let before = ids(&store);
        let writes = store.backend().writes();
        assert!(!store.reorder(before[0], 999));
        assert!(!store.reorder(999, before[0]));
        assert_eq!(ids(&store), before);
        assert_eq!(store.backend().writes(), writes);
    }

    #[test]
    fn test_update_refreshes_timestamp() {
        let mut store = store_with(1);
        let id = store.first_id().unwrap();
        let before = store.get(id).unwrap().updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(store.update(id, "Title", "<p>Body</p>"));
        let note = store.get(id).unwrap();
        assert_eq!(note.title, "Title");
        assert_eq!(note.content, "<p>Body</p>");
        assert!(note.updated_at > before);
        assert!(!store.update(999, "x", "y"));
    }

    #[test]
    fn test_every_mutation_persists() {
        let mut store = store_with(1);
        let writes = store.backend().writes();
        let id = store.create();
        store.update(id, "a", "b");
        store.reorder(id, store.notes()[1].id);
        store.delete(id);
        assert_eq!(store.backend().writes(), writes + 4);

        let raw = store.backend().raw(NOTES_KEY).unwrap();
        let saved: Vec<Note> = serde_json::from_str(raw).unwrap();
        assert_eq!(saved, store.notes());
    }

    #[test]
    fn test_write_failure_keeps_state_and_warns() {
        let mut store = store_with(1);
        store.backend_mut().set_fail_writes(true);

        let id = store.create();
        assert_eq!(store.len(), 2);
        assert!(store.get(id).is_some());

        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("quota exceeded"));
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_reopen_from_file_store() {
        let dir = tempdir().unwrap();
        let mut store = NoteStore::open(FileStore::new(dir.path())).unwrap();
        let id = store.create();
        store.update(id, "Persisted", "<p>x</p>");
        let expected: Vec<Note> = store.notes().to_vec();
        drop(store);

        let reopened = NoteStore::open(FileStore::new(dir.path())).unwrap();
        assert_eq!(reopened.notes(), expected.as_slice());
    }

    #[test]
    fn test_corrupt_json_is_error() {
        let backend = MemoryStore::with_value(NOTES_KEY, "{not json");
        assert!(matches!(NoteStore::open(backend), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_loads_existing_records() {
        let raw = r#"[{"id":1,"title":"A","content":"<p>a</p>","updatedAt":"2024-01-02T03:04:05.000Z"},
                      {"id":2,"title":"B","content":"","updatedAt":"2024-01-02T03:04:05.000Z"}]"#;
        let store = NoteStore::open(MemoryStore::with_value(NOTES_KEY, raw)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.first_id(), Some(1));
        assert_eq!(store.backend().writes(), 0);
    }
}
