mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::SlotCatalog;
use crate::limits::*;
use crate::mirror::{MirrorFanout, MirrorStore};
use crate::model::*;
use crate::notify::EventHub;
use crate::observability::LOCK_WAIT_SECONDS;
use crate::reconcile::Reconciler;
use crate::store::ReservationStore;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How long `book`/`cancel` wait for a slot lock before `SlotContended`.
    pub lock_wait: Duration,
    pub mirror_queue_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_millis(DEFAULT_LOCK_WAIT_MS),
            mirror_queue_capacity: MIRROR_QUEUE_CAPACITY,
        }
    }
}

/// The reservation engine.
///
/// One mutex per catalog slot guards the decisive ledger read together with
/// the write it leads to, so the at-most-one-booked-per-slot check can never
/// be raced. The guarded work runs on its own task, so a caller that stops
/// waiting cannot release the lock before the write is visible. Locks are
/// never nested by `book`/`cancel` and never held across a mirror write.
pub struct Engine {
    pub(super) catalog: Arc<SlotCatalog>,
    pub(super) store: Arc<dyn ReservationStore>,
    pub(super) mirror: Option<MirrorFanout>,
    slot_locks: Vec<Arc<Mutex<()>>>,
    lock_wait: Duration,
    pub events: Arc<EventHub>,
}

impl Engine {
    /// Must be called from inside a tokio runtime when a mirror is given
    /// (the mirror fanout task is spawned here).
    pub fn new(
        catalog: Arc<SlotCatalog>,
        store: Arc<dyn ReservationStore>,
        mirror: Option<Arc<dyn MirrorStore>>,
        options: EngineOptions,
    ) -> Self {
        let events = Arc::new(EventHub::new());
        let mirror = mirror.map(|m| {
            MirrorFanout::spawn(m, events.clone(), options.mirror_queue_capacity)
        });
        let slot_locks = (0..catalog.len()).map(|_| Arc::new(Mutex::new(()))).collect();
        Self {
            catalog,
            store,
            mirror,
            slot_locks,
            lock_wait: options.lock_wait,
            events,
        }
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    pub fn store(&self) -> Arc<dyn ReservationStore> {
        self.store.clone()
    }

    /// Acquire the slot's critical section, or fail fast after `lock_wait`.
    pub(super) async fn lock_slot(&self, slot: &Slot) -> Result<OwnedMutexGuard<()>, EngineError> {
        let start = Instant::now();
        let lock = self.slot_locks[slot.id as usize].clone();
        let guard = tokio::time::timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| EngineError::SlotContended(slot.id))?;
        metrics::histogram!(LOCK_WAIT_SECONDS).record(start.elapsed().as_secs_f64());
        Ok(guard)
    }

    /// Run `work` to completion on its own task while `guard` is held.
    ///
    /// Dropping the returned future does not stop `work`; the guard is
    /// released only once `work` has finished.
    pub(super) async fn run_locked<G, T, F>(guard: G, work: F) -> Result<T, EngineError>
    where
        G: Send + 'static,
        T: Send + 'static,
        F: Future<Output = Result<T, EngineError>> + Send + 'static,
    {
        tokio::spawn(async move {
            let result = work.await;
            drop(guard);
            result
        })
        .await
        .map_err(|e| EngineError::StoreUnavailable(format!("critical section aborted: {e}")))?
    }

    /// Current ledger contents.
    pub(super) async fn ledger(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.store.snapshot().await?)
    }

    /// Wait until every mirror write queued so far has been attempted.
    pub async fn flush_mirror(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.flush().await;
        }
    }

    /// Mirror writes that failed or were dropped since startup.
    pub fn mirror_failures(&self) -> u64 {
        self.mirror.as_ref().map_or(0, MirrorFanout::failures)
    }

    /// Drift checker over this engine's ledger and mirror. `None` without a mirror.
    pub fn reconciler(&self) -> Option<Reconciler> {
        self.mirror.as_ref().map(|m| {
            Reconciler::new(self.catalog.clone(), self.store.clone(), m.store())
        })
    }
}
