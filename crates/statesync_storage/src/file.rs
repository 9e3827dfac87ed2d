//! File-based storage backend for persistent storage.

use crate::backend::KeyValueStorage;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// A file-backed key/value store.
///
/// All entries live in a single JSON object document. The whole document is
/// loaded on open and rewritten on every change, so data survives process
/// restarts.
///
/// # Durability
///
/// Every mutation writes a sibling temporary file, calls `sync_all`, then
/// renames it over the document. A crash leaves either the old or the new
/// document, never a torn one.
///
/// # Example
///
/// ```no_run
/// use statesync_storage::{FileStorage, KeyValueStorage};
/// use std::path::Path;
///
/// let storage = FileStorage::open(Path::new("state.json")).unwrap();
/// storage.set_item("/settings", "{\"theme\":\"dark\"}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens or creates a storage document at the given path.
    ///
    /// A missing or empty file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object
    /// of strings.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let items = if contents.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&contents).map_err(|e| StorageError::Corrupted {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        Ok(Self {
            path: path.to_path_buf(),
            items: RwLock::new(items),
        })
    }

    /// Opens or creates a storage document, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> StorageResult<()> {
        let encoded = serde_json::to_vec(items)?;
        let tmp_path = self.path.with_extension("tmp");

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&encoded)?;
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        tracing::trace!(path = %self.path.display(), entries = items.len(), "storage document persisted");
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = self.items.write();
        let previous = items.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&items) {
            // Keep memory and disk in agreement.
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut items = self.items.write();
        let Some(previous) = items.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&items) {
            items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.items.read().keys().cloned().collect())
    }
}
