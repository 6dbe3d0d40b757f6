use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::model::{Booking, Slot};
use crate::notify::{EngineEvent, EventHub, MirrorOp};
use crate::observability::MIRROR_WRITE_FAILURES_TOTAL;

use super::{MirrorError, MirrorStore};

enum MirrorCommand {
    Put(Booking),
    Remove { slot: Slot, user_email: String },
    /// Answered once every command queued before it has been attempted.
    Barrier(oneshot::Sender<()>),
}

struct FailureSink {
    failures: AtomicU64,
    events: Arc<EventHub>,
}

impl FailureSink {
    fn record(&self, op: MirrorOp, label: &str, user_email: &str, err: &MirrorError) {
        warn!("mirror {} for {label}/{user_email} failed: {err}", op.as_str());
        self.failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(MIRROR_WRITE_FAILURES_TOTAL, "op" => op.as_str()).increment(1);
        self.events.send(EngineEvent::MirrorWriteFailed {
            op,
            label: label.to_string(),
            user_email: user_email.to_string(),
            reason: err.to_string(),
        });
    }
}

/// Applies mirror writes in submission order on a background task so that
/// engine callers never wait on the mirror. A put and a later remove of the
/// same booking therefore land in that order.
async fn mirror_writer_loop(
    mirror: Arc<dyn MirrorStore>,
    sink: Arc<FailureSink>,
    mut rx: mpsc::Receiver<MirrorCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            MirrorCommand::Put(booking) => {
                if let Err(e) = mirror.put(&booking).await {
                    sink.record(MirrorOp::Put, &booking.label, &booking.user_email, &e);
                }
            }
            MirrorCommand::Remove { slot, user_email } => {
                if let Err(e) = mirror.remove(&slot, &user_email).await {
                    sink.record(MirrorOp::Remove, &slot.label, &user_email, &e);
                }
            }
            MirrorCommand::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

pub struct MirrorFanout {
    tx: mpsc::Sender<MirrorCommand>,
    sink: Arc<FailureSink>,
    mirror: Arc<dyn MirrorStore>,
}

impl MirrorFanout {
    /// Start the writer task. Must be called from inside a tokio runtime.
    pub fn spawn(mirror: Arc<dyn MirrorStore>, events: Arc<EventHub>, capacity: usize) -> Self {
        let sink = Arc::new(FailureSink {
            failures: AtomicU64::new(0),
            events,
        });
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(mirror_writer_loop(mirror.clone(), sink.clone(), rx));
        Self { tx, sink, mirror }
    }

    /// Queue a put. Never waits; a full queue counts as a failed write.
    pub fn put(&self, booking: &Booking) {
        if let Err(e) = self.tx.try_send(MirrorCommand::Put(booking.clone())) {
            self.sink
                .record(MirrorOp::Put, &booking.label, &booking.user_email, &queue_error(e));
        }
    }

    /// Queue a remove. Never waits; a full queue counts as a failed write.
    pub fn remove(&self, slot: &Slot, user_email: &str) {
        let cmd = MirrorCommand::Remove {
            slot: slot.clone(),
            user_email: user_email.to_string(),
        };
        if let Err(e) = self.tx.try_send(cmd) {
            self.sink
                .record(MirrorOp::Remove, &slot.label, user_email, &queue_error(e));
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(MirrorCommand::Barrier(done)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Mirror writes that failed or were dropped since startup.
    pub fn failures(&self) -> u64 {
        self.sink.failures.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> Arc<dyn MirrorStore> {
        self.mirror.clone()
    }
}

fn queue_error<T>(e: mpsc::error::TrySendError<T>) -> MirrorError {
    match e {
        mpsc::error::TrySendError::Full(_) => MirrorError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => MirrorError::Closed,
    }
}
