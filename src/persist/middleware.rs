//! Persistence middleware wrapping a state container
//! Hydrates once at construction, then debounces a write-back of the
//! projected snapshot on every mutation; a failed hydration permanently
//! suppresses writes so a record the engine could not interpret is never
//! overwritten by degraded in-memory state

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;

use crate::codec;
use crate::partitions::{Partition, RECORD_KEY};
use crate::persist::debounce::DebounceCell;
use crate::store::backend::StorageBackend;

/// Default debounce window for write-back
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Strategy a state type supplies to become persistable.
///
/// `project` selects the durable subset of the state (transient flags like
/// loading indicators stay out); `absorb` folds a previously persisted
/// snapshot back into live state. Only data fields are merged, so behavior
/// the state type defines is untouched by hydration.
pub trait Persist: Send + Sync + 'static {
    /// The durable subset of the state. Must round-trip through the codec.
    type Snapshot: Serialize + DeserializeOwned + Send + 'static;

    /// Materialize the durable subset of the current state.
    fn project(&self) -> Self::Snapshot;

    /// Shallow-merge a persisted snapshot into live state.
    fn absorb(&mut self, snapshot: Self::Snapshot);
}

/// Per-container hydration lifecycle. Transitions exactly once forward;
/// `Hydrated` and `HydrationFailed` are terminal (manual re-hydrate is the
/// only sanctioned re-entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationState {
    NotStarted,
    Hydrating,
    Hydrated,
    HydrationFailed,
}

impl HydrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Hydrated | Self::HydrationFailed)
    }
}

/// Construction options for [`PersistedStore`]
#[derive(Clone)]
pub struct PersistOptions {
    /// Quiet period before a pending snapshot is written back
    pub debounce: Duration,
    /// Record key within the partition
    pub key: &'static str,
    /// Invoked once hydration completes successfully (including cold start)
    pub on_hydrated: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            key: RECORD_KEY,
            on_hydrated: None,
        }
    }
}

/// A state container made durable.
///
/// Mutations through [`update`](Self::update) apply to the in-memory state
/// immediately; the projected snapshot reaches the store best-effort, after
/// the debounce window, and only once hydration has succeeded. Clones share
/// the same underlying container.
pub struct PersistedStore<S: Persist> {
    shared: Arc<Shared<S>>,
}

impl<S: Persist> Clone for PersistedStore<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<S: Persist> {
    partition: Partition,
    key: &'static str,
    backend: Arc<dyn StorageBackend>,
    state: RwLock<S>,
    hydration: watch::Sender<HydrationState>,
    debounce: DebounceCell,
    /// Latest projected snapshot awaiting the debounce timer
    pending: Mutex<Option<S::Snapshot>>,
    on_hydrated: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl<S: Persist> PersistedStore<S> {
    /// Wrap the state produced by `factory` and schedule hydration.
    ///
    /// Returns immediately; the hydration pass runs as a spawned task, so
    /// reads may observe the factory's initial values until it completes.
    /// Must be called from within a tokio runtime.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        partition: Partition,
        factory: impl FnOnce() -> S,
        options: PersistOptions,
    ) -> Self {
        let (hydration, _) = watch::channel(HydrationState::NotStarted);
        let shared = Arc::new(Shared {
            partition,
            key: options.key,
            backend,
            state: RwLock::new(factory()),
            hydration,
            debounce: DebounceCell::new(options.debounce),
            pending: Mutex::new(None),
            on_hydrated: options.on_hydrated,
        });

        tokio::spawn(Arc::clone(&shared).hydrate());

        Self { shared }
    }

    /// Run `f` against the current state.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.shared.state.read().expect("lock poisoned");
        f(&state)
    }

    /// Clone out the current state.
    pub fn read(&self) -> S
    where
        S: Clone,
    {
        self.with(Clone::clone)
    }

    /// Apply a mutation to the in-memory state and schedule a write-back.
    ///
    /// The snapshot is projected immediately (so the write reflects the
    /// state after this mutation) but reaches the store only after the
    /// debounce window passes with no further mutations.
    pub fn update(&self, mutate: impl FnOnce(&mut S)) {
        {
            let mut state = self.shared.state.write().expect("lock poisoned");
            mutate(&mut state);
        }
        self.schedule_write();
    }

    fn schedule_write(&self) {
        if *self.shared.hydration.borrow() == HydrationState::HydrationFailed {
            return;
        }

        let snapshot = {
            let state = self.shared.state.read().expect("lock poisoned");
            state.project()
        };
        *self.shared.pending.lock().expect("lock poisoned") = Some(snapshot);

        let shared = Arc::clone(&self.shared);
        self.shared.debounce.arm(move || async move {
            shared.flush_pending().await;
        });
    }

    /// Current hydration status.
    pub fn hydration_state(&self) -> HydrationState {
        *self.shared.hydration.borrow()
    }

    /// Wait until hydration reaches a terminal state and return it.
    pub async fn wait_hydrated(&self) -> HydrationState {
        let mut rx = self.shared.hydration.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return state;
            }
        }
    }

    /// Re-run the hydration pass and wait for it.
    ///
    /// The one sanctioned way out of a terminal state - callers that need
    /// to block on durability can recover a `HydrationFailed` container
    /// after the underlying store comes back.
    pub async fn rehydrate(&self) -> HydrationState {
        Arc::clone(&self.shared).hydrate().await;
        self.hydration_state()
    }

    /// Write any pending snapshot out now, skipping the debounce window.
    pub async fn flush(&self) {
        self.shared.debounce.cancel();
        self.shared.flush_pending().await;
    }
}

impl<S: Persist> Shared<S> {
    async fn hydrate(self: Arc<Self>) {
        self.hydration.send_replace(HydrationState::Hydrating);

        match self.backend.get(self.partition, self.key).await {
            Ok(Some(payload)) => match codec::decode::<S::Snapshot>(&payload) {
                Ok(snapshot) => {
                    {
                        let mut state = self.state.write().expect("lock poisoned");
                        state.absorb(snapshot);
                    }
                    self.finish_hydration();
                }
                Err(err) => {
                    // Leave the record in place for inspection; never
                    // overwrite what we could not interpret.
                    tracing::warn!(
                        partition = %self.partition,
                        error = %err,
                        "failed to decode persisted record, persistence disabled"
                    );
                    self.hydration.send_replace(HydrationState::HydrationFailed);
                }
            },
            Ok(None) => {
                // Cold start: defaults stand.
                self.finish_hydration();
            }
            Err(err) => {
                tracing::warn!(
                    partition = %self.partition,
                    error = %err,
                    "failed to read persisted record, persistence disabled"
                );
                self.hydration.send_replace(HydrationState::HydrationFailed);
            }
        }
    }

    fn finish_hydration(&self) {
        self.hydration.send_replace(HydrationState::Hydrated);
        if let Some(on_hydrated) = &self.on_hydrated {
            on_hydrated();
        }
    }

    async fn flush_pending(&self) {
        // Hydration gate: the merge-into-state always happens before any
        // scheduled write is allowed to execute. A timer that fires before
        // hydration completes drops its snapshot rather than queuing it.
        if *self.hydration.borrow() != HydrationState::Hydrated {
            if self.pending.lock().expect("lock poisoned").take().is_some() {
                tracing::debug!(
                    partition = %self.partition,
                    "dropped pending write, container not hydrated"
                );
            }
            return;
        }

        let snapshot = self.pending.lock().expect("lock poisoned").take();
        let Some(snapshot) = snapshot else {
            return;
        };

        let payload = match codec::encode(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(
                    partition = %self.partition,
                    error = %err,
                    "failed to encode snapshot, write skipped"
                );
                return;
            }
        };

        // No retry queue: the next mutation re-arms a fresh cycle, so
        // transient failures self-heal as long as mutations keep coming.
        if let Err(err) = self.backend.set(self.partition, self.key, payload).await {
            tracing::warn!(
                partition = %self.partition,
                error = %err,
                "debounced write failed"
            );
        }
    }
}
