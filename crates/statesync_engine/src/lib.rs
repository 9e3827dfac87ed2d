//! # statesync engine
//!
//! Load-once-then-sync state cells for statesync.
//!
//! This crate provides:
//! - Synchronized cells (uninitialized → loading → ready)
//! - A process-wide or caller-owned load registry
//! - Two-source composition with a fixed precedence
//! - Cursors over the keys of nested state
//! - Local (key/value storage) and remote (HTTP) store adapters
//!
//! ## Architecture
//!
//! Every cell follows a **load-then-sync** model:
//! 1. On mount, the first cell for a key reads the store
//! 2. A stored value replaces the initial value; nothing stored pushes the
//!    initial value out
//! 3. Every local change is written back exactly once
//!
//! Cells, composers and cursors all implement [`StateHandle`], so a cursor
//! over a composition of a local and a remote cell is just another handle.
//!
//! ## Key Invariants
//!
//! - A loaded value is never written back
//! - A key is loaded at most once per registry and store kind
//! - Failures never escape a setter; they go to the error hook
//! - The second source of a composition is authoritative
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use statesync_engine::{local_state, StateHandle, SyncConfig};
//! use statesync_storage::{InMemoryStorage, KeyValueStorage};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(InMemoryStorage::new());
//! let counter = local_state("/counter", 0u32, Arc::clone(&storage), SyncConfig::isolated());
//!
//! counter.update(|n| n + 1);
//! assert_eq!(storage.get_item("/counter").unwrap().as_deref(), Some("1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compose;
mod config;
mod cursor;
mod error;
mod http;
mod local;
mod registry;
mod shape;
mod state;
mod store;
mod value;

pub use compose::{compose, Composed};
pub use config::{RemoteConfig, SyncConfig};
pub use cursor::{Cursor, CursorFactory, CursorKey};
pub use error::{log_error, ErrorHook, SyncError, SyncResult};
pub use http::{
    remote_state, HttpClient, HttpFuture, HttpMethod, HttpRequest, HttpResponse, RemoteStore,
    REMOTE_SCOPE,
};
pub use local::{decode_local, encode_local, local_state, LocalStore, LOCAL_SCOPE};
pub use registry::LoadRegistry;
pub use shape::{fingerprint, merge_state, shallow_merge, Shape};
pub use state::{sync, CellPhase, CellStats, SyncEngine, SyncedState};
pub use store::{Awaitable, FnStore, MemoryStore, StateStore, StoreFuture};
pub use value::{Setter, StateHandle, StateUpdate, StateValue, UpdateFn};
