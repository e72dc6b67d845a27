mod file_store;
mod memory_store;
mod note_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use note_store::{NoteStore, NOTES_KEY};

use crate::Result;

/// A local key-value store holding serialized values under string keys
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}
