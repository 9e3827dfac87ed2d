//! # statesync storage
//!
//! Key/value storage backends for statesync.
//!
//! This crate provides the persistence layer underneath the local store
//! adapter. Backends are **opaque string stores**: they map a key to the
//! exact string that was set for it and never interpret the content.
//!
//! ## Design Principles
//!
//! - Backends are simple string maps (get, set, remove)
//! - No knowledge of JSON encoding or of the sync protocol
//! - Must be `Send + Sync` for sharing between cells
//!
//! ## Available Backends
//!
//! - [`InMemoryStorage`] - For testing and ephemeral caches
//! - [`FileStorage`] - A JSON document on disk, rewritten on every change
//!
//! ## Example
//!
//! ```rust
//! use statesync_storage::{InMemoryStorage, KeyValueStorage};
//!
//! let storage = InMemoryStorage::new();
//! storage.set_item("/foo/bar", "{\"hi\":5}").unwrap();
//! assert_eq!(storage.get_item("/foo/bar").unwrap().as_deref(), Some("{\"hi\":5}"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::KeyValueStorage;
pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use memory::InMemoryStorage;
