use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{error, info};
use ulid::Ulid;

use crate::limits::LEDGER_QUEUE_CAPACITY;
use crate::model::Booking;
use crate::observability::{
    LEDGER_FLUSH_BATCH_SIZE, LEDGER_FLUSH_DURATION_SECONDS, LEDGER_REWRITES_TOTAL,
};

use super::log::LedgerLog;
use super::{ReservationStore, StoreError};

type Ledger = Arc<RwLock<Vec<Booking>>>;

enum LedgerCommand {
    Append {
        booking: Booking,
        response: oneshot::Sender<io::Result<()>>,
    },
    ReplaceAll {
        bookings: Vec<Booking>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Cancel {
        id: Ulid,
        response: oneshot::Sender<io::Result<bool>>,
    },
}

/// Background task that owns the ledger file and batches appends for group
/// commit.
/// 1. Block until the first command arrives.
/// 2. For an Append, drain every Append already queued (the batch window).
/// 3. Single flush_sync for the whole batch, then publish it to the in-memory copy.
/// 4. Rewrites (cancel, replace) run one at a time after the batch.
async fn ledger_writer_loop(
    mut log: LedgerLog,
    ledger: Ledger,
    mut rx: mpsc::Receiver<LedgerCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            LedgerCommand::Append { booking, response } => {
                let mut batch = vec![(booking, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(LedgerCommand::Append { booking, response }) => {
                            batch.push((booking, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // queue drained, commit batch
                    }
                }
                commit_batch(&mut log, &ledger, batch).await;
                if let Some(other) = deferred {
                    handle_rewrite(&mut log, &ledger, other).await;
                }
            }
            other => handle_rewrite(&mut log, &ledger, other).await,
        }
    }
}

async fn commit_batch(
    log: &mut LedgerLog,
    ledger: &Ledger,
    batch: Vec<(Booking, oneshot::Sender<io::Result<()>>)>,
) {
    metrics::histogram!(LEDGER_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = Instant::now();
    let mut result = Ok(());
    for (booking, _) in &batch {
        if let Err(e) = log.append_buffered(booking) {
            result = Err(e);
            break;
        }
    }
    // Flush even after a failed encode so the batch is settled either way.
    let flushed = log.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(LEDGER_FLUSH_DURATION_SECONDS).record(flush_start.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            let mut guard = ledger.write().await;
            for (booking, response) in batch {
                guard.push(booking);
                let _ = response.send(Ok(()));
            }
        }
        Err(e) => {
            error!("ledger append failed for {} bookings: {e}", batch.len());
            // Callers are told this batch failed, so no part of it may reach
            // disk, whether flushed already or still buffered.
            let current = ledger.read().await.clone();
            if let Err(re) = log.rewrite(&current) {
                error!("ledger restore after failed append also failed: {re}");
            }
            for (_, response) in batch {
                let _ = response.send(Err(io::Error::new(e.kind(), e.to_string())));
            }
        }
    }
}

async fn handle_rewrite(log: &mut LedgerLog, ledger: &Ledger, cmd: LedgerCommand) {
    match cmd {
        LedgerCommand::ReplaceAll { bookings, response } => {
            let result = log.rewrite(&bookings);
            if result.is_ok() {
                *ledger.write().await = bookings;
                metrics::counter!(LEDGER_REWRITES_TOTAL).increment(1);
            }
            let _ = response.send(result);
        }
        LedgerCommand::Cancel { id, response } => {
            let mut next = ledger.read().await.clone();
            let Some(pos) = next.iter().position(|b| b.id == id && b.is_booked()) else {
                let _ = response.send(Ok(false));
                return;
            };
            // The flat file has no per-record update: cancelling removes the row.
            next.remove(pos);
            let result = log.rewrite(&next);
            if result.is_ok() {
                *ledger.write().await = next;
                metrics::counter!(LEDGER_REWRITES_TOTAL).increment(1);
            }
            let _ = response.send(result.map(|()| true));
        }
        LedgerCommand::Append { .. } => unreachable!(),
    }
}

/// File-backed ledger. One writer task owns the file; `snapshot()` is served
/// from an in-memory copy the writer updates only after a durable write.
pub struct FileLedger {
    tx: mpsc::Sender<LedgerCommand>,
    ledger: Ledger,
    path: PathBuf,
}

impl FileLedger {
    /// Replay the ledger at `path` and start its writer task.
    /// Must be called from inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let bookings = LedgerLog::replay(path)?;
        let log = LedgerLog::open(path)?;
        info!(
            "ledger {} opened with {} records",
            log.path().display(),
            bookings.len()
        );

        let ledger = Arc::new(RwLock::new(bookings));
        let (tx, rx) = mpsc::channel(LEDGER_QUEUE_CAPACITY);
        tokio::spawn(ledger_writer_loop(log, ledger.clone(), rx));

        Ok(Self {
            tx,
            ledger,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn request<T>(
        &self,
        cmd: LedgerCommand,
        rx: oneshot::Receiver<io::Result<T>>,
    ) -> Result<T, StoreError> {
        self.tx.send(cmd).await.map_err(|_| StoreError::Closed)?;
        Ok(rx.await.map_err(|_| StoreError::Closed)??)
    }
}

#[async_trait]
impl ReservationStore for FileLedger {
    async fn snapshot(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.ledger.read().await.clone())
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        let (response, rx) = oneshot::channel();
        self.request(LedgerCommand::Append { booking, response }, rx).await
    }

    async fn replace_all(&self, bookings: Vec<Booking>) -> Result<(), StoreError> {
        let (response, rx) = oneshot::channel();
        self.request(LedgerCommand::ReplaceAll { bookings, response }, rx).await
    }

    async fn cancel(&self, id: Ulid) -> Result<bool, StoreError> {
        let (response, rx) = oneshot::channel();
        self.request(LedgerCommand::Cancel { id, response }, rx).await
    }
}
