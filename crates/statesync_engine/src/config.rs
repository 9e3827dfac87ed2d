//! Configuration for the sync engine and its adapters.

use crate::error::{log_error, ErrorHook, SyncError};
use crate::registry::LoadRegistry;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Configuration shared by every cell an engine mounts.
#[derive(Clone)]
pub struct SyncConfig {
    /// Registry deduplicating first loads.
    pub registry: LoadRegistry,
    /// Receives load and write failures.
    pub on_error: ErrorHook,
}

impl SyncConfig {
    /// Creates a configuration around an explicit registry.
    pub fn new(registry: LoadRegistry) -> Self {
        Self {
            registry,
            on_error: log_error(),
        }
    }

    /// Creates a configuration with a fresh, private registry.
    pub fn isolated() -> Self {
        Self::new(LoadRegistry::new())
    }

    /// Sets the registry.
    pub fn with_registry(mut self, registry: LoadRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the error hook.
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(hook);
        self
    }
}

/// Uses the process-wide registry and logs errors.
impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(LoadRegistry::global())
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Configuration for the remote store adapter.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Prefix prepended to every key to form the request URL.
    pub base_url: String,
    /// Headers sent with every GET and POST.
    pub headers: Vec<(String, String)>,
    /// Response statuses treated as success.
    pub accepted_status: Range<u16>,
}

impl RemoteConfig {
    /// Creates a configuration with the given URL prefix.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
            accepted_status: 200..400,
        }
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the accepted status range.
    pub fn with_accepted_status(mut self, range: Range<u16>) -> Self {
        self.accepted_status = range;
        self
    }

    /// Builds the request URL for `key`.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }

    /// Returns true if `status` counts as success.
    pub fn accepts(&self, status: u16) -> bool {
        self.accepted_status.contains(&status)
    }
}

/// Keys are used as-is for the URL.
impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new("")
    }
}
