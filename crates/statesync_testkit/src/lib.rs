//! # statesync testkit
//!
//! Test utilities for statesync.
//!
//! This crate provides:
//! - Stores that record their traffic
//! - A scripted HTTP client for remote cells
//! - Error sinks to assert on hook deliveries
//! - Temporary file storage
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use statesync_engine::{sync, StateHandle, SyncConfig};
//! use statesync_testkit::prelude::*;
//!
//! let store = RecordingStore::new();
//! let state = sync("/k", json!(1), store.clone(), SyncConfig::isolated());
//! state.set(json!(2));
//!
//! assert_eq!(store.reads(), vec!["/k".to_string()]);
//! assert_eq!(store.writes().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod http;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::http::*;
}

pub use fixtures::*;
pub use generators::*;
pub use http::*;
