// Durable key/value storage for the persisted slice of client state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::CoreError;

/// A string key/value store, like a browser's local storage.
pub trait StateStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CoreError>;
}

// ── FileStorage ─────────────────────────────────────────────────────

/// All keys in one JSON object on disk. The file and its parent
/// directory are created on first write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(storage_error(&self.path, &e)),
        };
        serde_json::from_str(&raw).map_err(|e| storage_error(&self.path, &e))
    }
}

impl StateStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        // An unreadable file is replaced rather than blocking every write.
        let mut entries = self.load().unwrap_or_default();
        entries.insert(key.to_owned(), value.to_owned());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage_error(&self.path, &e))?;
        }
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| storage_error(&self.path, &e))
    }
}

fn storage_error(path: &Path, err: &dyn std::fmt::Display) -> CoreError {
    CoreError::Config {
        message: format!("state file {}: {err}", path.display()),
    }
}

// ── MemoryStorage ───────────────────────────────────────────────────

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .entries
            .lock()
            .expect("memory storage lock poisoned")
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries
            .lock()
            .expect("memory storage lock poisoned")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("state.json"));

        assert_eq!(storage.read("app-storage").unwrap(), None);
        storage.write("other", "1").unwrap();
        storage.write("app-storage", r#"{"dark_mode":true}"#).unwrap();

        let reopened = FileStorage::new(storage.path());
        assert_eq!(
            reopened.read("app-storage").unwrap().as_deref(),
            Some(r#"{"dark_mode":true}"#)
        );
        assert_eq!(reopened.read("other").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn corrupt_file_is_an_error_on_read_but_not_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.read("app-storage"), Err(CoreError::Config { .. })));

        storage.write("app-storage", "{}").unwrap();
        assert_eq!(storage.read("app-storage").unwrap().as_deref(), Some("{}"));
    }
}
