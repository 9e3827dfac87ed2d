//! Test fixtures.
//!
//! Stores that record what a cell asked of them, error sinks, temporary
//! file storage and tracing setup.

use parking_lot::Mutex;
use serde_json::Value;
use statesync_engine::{Awaitable, ErrorHook, StateStore, SyncConfig, SyncError};
use statesync_storage::FileStorage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Recorded {
    items: Mutex<HashMap<String, Value>>,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Value)>>,
}

/// An in-memory JSON store that records every read and write.
///
/// Clones share the same contents and log.
#[derive(Clone, Default)]
pub struct RecordingStore {
    recorded: Arc<Recorded>,
    delay: Option<Duration>,
    fail_reads: bool,
    fail_writes: bool,
}

impl RecordingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` without recording a write.
    pub fn with_item(self, key: &str, value: Value) -> Self {
        self.recorded.items.lock().insert(key.to_string(), value);
        self
    }

    /// Makes reads and writes complete after `delay` on the tokio runtime.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every read fail.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Makes every write fail.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Returns the keys read so far.
    pub fn reads(&self) -> Vec<String> {
        self.recorded.reads.lock().clone()
    }

    /// Returns the writes issued so far.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.recorded.writes.lock().clone()
    }

    /// Returns the stored value for `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.recorded.items.lock().get(key).cloned()
    }

    fn finish<T: Send + 'static>(&self, result: Result<T, SyncError>) -> Awaitable<T> {
        match self.delay {
            None => Awaitable::Ready(result),
            Some(delay) => Awaitable::pending(async move {
                tokio::time::sleep(delay).await;
                result
            }),
        }
    }
}

impl StateStore<Value> for RecordingStore {
    fn read(&self, key: &str) -> Awaitable<Option<Value>> {
        self.recorded.reads.lock().push(key.to_string());
        let result = if self.fail_reads {
            Err(SyncError::Transport(format!("read of '{key}' refused")))
        } else {
            Ok(self.get(key))
        };
        self.finish(result)
    }

    fn write(&self, key: &str, value: Value) -> Awaitable<Value> {
        self.recorded.writes.lock().push((key.to_string(), value.clone()));
        let result = if self.fail_writes {
            Err(SyncError::Transport(format!("write of '{key}' refused")))
        } else {
            self.recorded.items.lock().insert(key.to_string(), value.clone());
            Ok(value)
        };
        self.finish(result)
    }
}

/// Collects every error delivered to its hook.
#[derive(Clone, Default)]
pub struct ErrorSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl ErrorSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a hook feeding this sink.
    pub fn hook(&self) -> ErrorHook {
        let messages = Arc::clone(&self.messages);
        Arc::new(move |err: &SyncError| messages.lock().push(err.to_string()))
    }

    /// Returns an isolated configuration reporting into this sink.
    pub fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::isolated();
        config.on_error = self.hook();
        config
    }

    /// Returns the messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Returns the number of errors received.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns true if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

/// File storage in a temporary directory, removed on drop.
pub struct TempStorage {
    dir: TempDir,
    path: PathBuf,
}

impl TempStorage {
    /// Creates a fresh directory; the storage file does not exist yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("state").join("store.json");
        Self { dir, path }
    }

    /// Opens the storage file, creating parent directories.
    pub fn open(&self) -> FileStorage {
        FileStorage::open_with_create_dirs(&self.path).expect("Failed to open file storage")
    }

    /// Returns the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use statesync_engine::{sync, StateHandle};
    use statesync_storage::KeyValueStorage;

    #[test]
    fn recording_store_logs_traffic() {
        let store = RecordingStore::new().with_item("/k", json!(1));
        let state = sync("/k", json!(0), store.clone(), SyncConfig::isolated());

        state.set(json!(2));
        assert_eq!(store.reads(), vec!["/k".to_string()]);
        assert_eq!(store.writes(), vec![("/k".to_string(), json!(2))]);
        assert_eq!(store.get("/k"), Some(json!(2)));
    }

    #[test]
    fn error_sink_collects() {
        let sink = ErrorSink::new();
        let store = RecordingStore::new().failing_reads();
        let _state = sync("/k", json!(0), store, sink.config());

        assert_eq!(sink.len(), 1);
        assert_eq!(
            sink.messages(),
            vec!["failed to load '/k': transport error: read of '/k' refused".to_string()]
        );
    }

    #[test]
    fn temp_storage_reopens() {
        init_tracing();
        let temp = TempStorage::new();
        temp.open().set_item("/k", "v").unwrap();
        assert_eq!(temp.open().get_item("/k").unwrap().as_deref(), Some("v"));
        assert!(temp.path().starts_with(temp.dir()));
    }
}
