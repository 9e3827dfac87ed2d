//! Sync engine state machine.
//!
//! A [`SyncedState`] is one cell of synchronized state for one key. Its
//! lifecycle is an explicit state machine:
//!
//! ```text
//! Uninitialized ──claim──▶ Loading ──read resolved──▶ Ready
//!       │                                               ▲
//!       └────────────── key already claimed ────────────┘
//! ```
//!
//! Loaded values are applied without marking the cell dirty, so they are
//! never written back. Every local `set_state` marks the cell dirty, and
//! the flush that follows writes the latest value back and clears the flag.

use crate::config::SyncConfig;
use crate::error::{ErrorHook, SyncError, SyncResult};
use crate::store::{Awaitable, StateStore};
use crate::value::{StateHandle, StateUpdate, StateValue};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Lifecycle phase of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPhase {
    /// Created, registry not consulted yet.
    Uninitialized,
    /// First load issued and not resolved.
    Loading,
    /// Load resolved, failed, or was skipped.
    Ready,
}

impl CellPhase {
    /// Returns true while the first load is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, CellPhase::Loading)
    }

    /// Returns true once the cell no longer waits on its load.
    pub fn is_ready(&self) -> bool {
        matches!(self, CellPhase::Ready)
    }
}

/// Counters about one cell's traffic with its store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStats {
    /// Reads issued (0 or 1).
    pub loads_issued: u64,
    /// Writes issued, including the initial push.
    pub writes_issued: u64,
    /// Reads that failed.
    pub load_failures: u64,
    /// Writes that failed.
    pub write_failures: u64,
}

struct CellState<V> {
    value: V,
    dirty: bool,
    phase: CellPhase,
    /// A local set happened while the load was in flight.
    set_while_loading: bool,
}

/// Tracks spawned loads and writes so callers can wait for quiescence.
#[derive(Default)]
struct Effects {
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Effects {
    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn settled(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct Cell<V> {
    key: String,
    state: Mutex<CellState<V>>,
    store: Arc<dyn StateStore<V>>,
    on_error: ErrorHook,
    stats: Mutex<CellStats>,
    effects: Arc<Effects>,
}

impl<V: StateValue> Cell<V> {
    fn report(&self, err: SyncError) {
        (self.on_error)(&err);
    }

    /// Runs `future` on the ambient runtime, tracked by `effects`.
    fn spawn_effect<F>(&self, future: F) -> SyncResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| SyncError::NoRuntime(self.key.clone()))?;

        self.effects.begin();
        let effects = Arc::clone(&self.effects);
        handle.spawn(async move {
            future.await;
            effects.end();
        });
        Ok(())
    }

    fn start_load(self: &Arc<Self>) {
        self.state.lock().phase = CellPhase::Loading;
        self.stats.lock().loads_issued += 1;
        tracing::debug!(key = %self.key, "loading");

        match self.store.read(&self.key) {
            Awaitable::Ready(result) => self.finish_load(result),
            Awaitable::Pending(future) => {
                let weak = Arc::downgrade(self);
                let key = self.key.clone();
                let spawned = self.spawn_effect(async move {
                    let result = future.await;
                    match weak.upgrade() {
                        Some(cell) => cell.finish_load(result),
                        None => {
                            tracing::debug!(key = %key, "cell dropped before its load resolved")
                        }
                    }
                });

                if let Err(err) = spawned {
                    self.finish_load(Err(err));
                }
            }
        }
    }

    fn finish_load(self: &Arc<Self>, result: SyncResult<Option<V>>) {
        let push = {
            let mut state = self.state.lock();
            state.phase = CellPhase::Ready;
            let set_while_loading = std::mem::take(&mut state.set_while_loading);

            match result {
                Err(err) => {
                    drop(state);
                    self.stats.lock().load_failures += 1;
                    self.report(SyncError::load(&self.key, err));
                    return;
                }
                Ok(_) if set_while_loading => {
                    // The local write already went out and is the newer value.
                    tracing::debug!(key = %self.key, "discarding load superseded by a local set");
                    None
                }
                Ok(Some(loaded)) => {
                    // Not dirty: a loaded value is never written back.
                    state.value = loaded;
                    tracing::debug!(key = %self.key, "load applied");
                    None
                }
                Ok(None) => {
                    tracing::debug!(key = %self.key, "nothing stored, pushing initial value");
                    Some(state.value.clone())
                }
            }
        };

        if let Some(value) = push {
            self.dispatch_write(value);
        }
    }

    /// Applies `update` to the current value in one critical section, so
    /// concurrent updates never read a stale previous value. The update
    /// function must not touch this cell.
    fn commit(self: &Arc<Self>, update: StateUpdate<V>) {
        {
            let mut state = self.state.lock();
            state.value = update.apply(&state.value);
            state.dirty = true;
            if state.phase.is_loading() {
                state.set_while_loading = true;
            }
        }

        self.flush();
    }

    /// Writes the current value back if a commit left the cell dirty.
    ///
    /// Commits racing on other threads may find the flag already cleared;
    /// the write issued here then carries their value too.
    fn flush(self: &Arc<Self>) {
        let write_back = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.dirty).then(|| state.value.clone())
        };

        if let Some(value) = write_back {
            self.dispatch_write(value);
        }
    }

    fn dispatch_write(self: &Arc<Self>, value: V) {
        self.stats.lock().writes_issued += 1;
        tracing::debug!(key = %self.key, "writing back");

        match self.store.write(&self.key, value) {
            Awaitable::Ready(Ok(_)) => {}
            Awaitable::Ready(Err(err)) => self.write_failed(err),
            Awaitable::Pending(future) => {
                let cell = Arc::clone(self);
                let spawned = self.spawn_effect(async move {
                    if let Err(err) = future.await {
                        cell.write_failed(err);
                    }
                });

                if let Err(err) = spawned {
                    self.write_failed(err);
                }
            }
        }
    }

    fn write_failed(&self, err: SyncError) {
        // Optimistic: the in-memory value stays.
        tracing::warn!(key = %self.key, "write-back failed, keeping the local value");
        self.stats.lock().write_failures += 1;
        self.report(SyncError::write(&self.key, err));
    }
}

/// One synchronized cell.
///
/// Cloning yields another handle to the same cell. The cell is discarded
/// when its last handle is dropped; a load resolving after that is ignored.
pub struct SyncedState<V> {
    cell: Arc<Cell<V>>,
}

impl<V: StateValue> SyncedState<V> {
    /// Returns the key this cell synchronizes.
    pub fn key(&self) -> &str {
        &self.cell.key
    }

    /// Returns the lifecycle phase.
    pub fn phase(&self) -> CellPhase {
        self.cell.state.lock().phase
    }

    /// Returns the traffic counters.
    pub fn stats(&self) -> CellStats {
        self.cell.stats.lock().clone()
    }

    /// Waits until no load or write spawned by this cell is in flight.
    pub async fn settled(&self) {
        self.cell.effects.settled().await;
    }
}

impl<V: StateValue> StateHandle<V> for SyncedState<V> {
    fn value(&self) -> V {
        self.cell.state.lock().value.clone()
    }

    fn set_state(&self, update: StateUpdate<V>) {
        self.cell.commit(update);
    }
}

impl<V> Clone for SyncedState<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<V> fmt::Debug for SyncedState<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedState")
            .field("key", &self.cell.key)
            .finish_non_exhaustive()
    }
}

/// Mounts cells over one store.
pub struct SyncEngine<V> {
    store: Arc<dyn StateStore<V>>,
    config: SyncConfig,
}

impl<V: StateValue> SyncEngine<V> {
    /// Creates an engine over `store`.
    pub fn new<S: StateStore<V>>(store: S, config: SyncConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Creates an engine over an already shared store.
    pub fn from_shared(store: Arc<dyn StateStore<V>>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mounts a cell for `key`.
    ///
    /// The first mount of a key within the configured registry and the
    /// store's registry scope reads the store; later mounts start from
    /// `initial` and never read. Synchronous
    /// stores are fully applied before this returns. Asynchronous stores
    /// need a tokio runtime; the cell shows `initial` until the read lands.
    pub fn sync(&self, key: impl Into<String>, initial: V) -> SyncedState<V> {
        let key = key.into();
        let cell = Arc::new(Cell {
            key,
            state: Mutex::new(CellState {
                value: initial,
                dirty: false,
                phase: CellPhase::Uninitialized,
                set_while_loading: false,
            }),
            store: Arc::clone(&self.store),
            on_error: Arc::clone(&self.config.on_error),
            stats: Mutex::new(CellStats::default()),
            effects: Arc::new(Effects::default()),
        });

        if self.config.registry.claim_in(self.store.registry_scope(), &cell.key) {
            cell.start_load();
        } else {
            tracing::debug!(key = %cell.key, "already loaded by another cell, skipping read");
            cell.state.lock().phase = CellPhase::Ready;
        }

        SyncedState { cell }
    }
}

impl<V> Clone for SyncEngine<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

/// Mounts a single cell for `key` over `store`.
pub fn sync<V, S>(key: impl Into<String>, initial: V, store: S, config: SyncConfig) -> SyncedState<V>
where
    V: StateValue,
    S: StateStore<V>,
{
    SyncEngine::new(store, config).sync(key, initial)
}
