//! Explicit cancellable debounce timer
//! At most one pending run at a time: arming replaces whatever was scheduled

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A single-slot debounce timer.
///
/// `arm` schedules a callback to run after the configured delay, cancelling
/// any run still pending; `cancel` revokes the pending run outright. The
/// generation counter lets a fired task clear only its own slot, so a timer
/// armed while an older one is mid-fire is never clobbered.
pub struct DebounceCell {
    delay: Duration,
    next_generation: AtomicU64,
    pending: Arc<Mutex<Option<(u64, CancellationToken)>>>,
}

impl DebounceCell {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_generation: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `fire` to run after the delay, superseding any pending run.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&self, fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = {
            let mut slot = self.pending.lock().expect("lock poisoned");
            slot.replace((generation, token.clone()))
        };
        if let Some((_, previous)) = previous {
            previous.cancel();
        }

        // Deadline is fixed here, at arm time, not when the task first polls.
        let sleep = tokio::time::sleep(self.delay);
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep => {
                    fire().await;
                    let mut slot = pending.lock().expect("lock poisoned");
                    if matches!(*slot, Some((current, _)) if current == generation) {
                        *slot = None;
                    }
                }
            }
        });
    }

    /// Revoke the pending run, if any.
    pub fn cancel(&self) {
        let taken = self.pending.lock().expect("lock poisoned").take();
        if let Some((_, token)) = taken {
            token.cancel();
        }
    }

    /// Whether a run is currently scheduled and not yet fired.
    pub fn is_armed(&self) -> bool {
        self.pending.lock().expect("lock poisoned").is_some()
    }
}
