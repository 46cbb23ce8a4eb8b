// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable key-value backends for the session store.
//!
//! Writes go through [`KeyValueStore::apply`], which commits a whole batch or
//! nothing, so the token and the user record can never disagree on disk.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PortalError, PortalResult};

/// File name of the durable store inside the session directory.
const STORE_FILE: &str = "session.json";

/// A batch of writes: `Some(value)` sets the key, `None` removes it.
pub type Batch<'a> = [(&'a str, Option<&'a str>)];

/// Durable string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a key. A store that cannot be parsed reports
    /// [`PortalError::MalformedPersistedState`].
    fn get(&self, key: &str) -> PortalResult<Option<String>>;

    /// Apply every change in the batch atomically.
    fn apply(&self, batch: &Batch<'_>) -> PortalResult<()>;
}

/// Process-local store, used in tests and by headless shells.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PortalResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PortalError::Storage("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, batch: &Batch<'_>) -> PortalResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PortalError::Storage("memory store lock poisoned".into()))?;
        for (key, value) in batch {
            match value {
                Some(value) => entries.insert(key.to_string(), value.to_string()),
                None => entries.remove(*key),
            };
        }
        Ok(())
    }
}

/// JSON-file store: one object of string values, rewritten via temp file and
/// rename on every batch.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORE_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> PortalResult<BTreeMap<String, String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(PortalError::Storage(e.to_string())),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PortalError::MalformedPersistedState(e.to_string()))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> PortalResult<()> {
        let io_err = |e: std::io::Error| PortalError::Storage(e.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&temp_path).map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, entries)
                .map_err(|e| PortalError::Storage(e.to_string()))?;
            writer.flush().map_err(io_err)?;
        }

        fs::rename(&temp_path, &self.path).map_err(io_err)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> PortalResult<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PortalError::Storage("file store lock poisoned".into()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn apply(&self, batch: &Batch<'_>) -> PortalResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PortalError::Storage("file store lock poisoned".into()))?;

        // A corrupt file is replaced rather than blocking every future write.
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(PortalError::MalformedPersistedState(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "Discarding corrupt session store");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        for (key, value) in batch {
            match value {
                Some(value) => entries.insert(key.to_string(), value.to_string()),
                None => entries.remove(*key),
            };
        }

        self.write_all(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_batch_sets_and_removes() {
        let store = MemoryStore::new();
        store.apply(&[("a", Some("1")), ("b", Some("2"))]).unwrap();
        store.apply(&[("a", None)]).unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        FileStore::new(dir.path())
            .apply(&[("token", Some("t-1"))])
            .unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("t-1"));
        assert!(!reopened.path().with_extension("tmp").exists());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[test]
    fn corrupt_file_reports_malformed_then_recovers_on_write() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(
            store.get("token"),
            Err(PortalError::MalformedPersistedState(_))
        ));

        store.apply(&[("token", Some("fresh"))]).unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("fresh"));
    }
}
