use super::KeyValueStore;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Key-value store keeping one file per key inside a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a new store rooted at `dir` (created lazily on first write)
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Check if a value exists for `key`
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if !self.exists(key) {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(self.path_for(key))?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let target = self.path_for(key);
            let tmp = target.with_extension("json.tmp");
            fs::write(&tmp, value)?;
            fs::rename(&tmp, &target)
        };
        write().map_err(|e| Error::Storage(format!("{}: {}", self.path_for(key).display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_key_reads_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(!store.exists("notes"));
        assert_eq!(store.get("notes").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));

        store.set("notes", "[1,2,3]").unwrap();
        assert!(store.exists("notes"));
        assert_eq!(store.get("notes").unwrap().as_deref(), Some("[1,2,3]"));

        store.set("notes", "[]").unwrap();
        assert_eq!(store.get("notes").unwrap().as_deref(), Some("[]"));
        assert!(!store.path_for("notes").with_extension("json.tmp").exists());
    }

    #[test]
    fn test_write_failure_is_storage_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut store = FileStore::new(blocker.join("sub"));
        let result = store.set("notes", "[]");
        assert!(matches!(result, Err(Error::Storage(_))));
    }
}
