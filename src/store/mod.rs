mod file;
mod log;
mod table;

pub use file::FileLedger;
pub use log::{LedgerLog, LEDGER_MAGIC};
pub use table::TableLedger;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::Booking;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    /// The backend's writer is gone (shut down or panicked).
    Closed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "ledger I/O error: {e}"),
            StoreError::Closed => write!(f, "ledger writer shut down"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// The authoritative booking ledger.
///
/// Every successful write is visible to every later `snapshot()` in the
/// process. Writes are all-or-nothing: a failed call leaves the ledger as it
/// was. Callers serialize conflicting writes themselves (the engine's slot
/// locks); the store only guarantees that independent writes never clobber
/// each other.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Point-in-time copy of the ledger, in insertion order.
    async fn snapshot(&self) -> Result<Vec<Booking>, StoreError>;

    async fn append(&self, booking: Booking) -> Result<(), StoreError>;

    /// Replace the whole ledger.
    async fn replace_all(&self, bookings: Vec<Booking>) -> Result<(), StoreError>;

    /// Move the booked record `id` to cancelled. Returns `false` when no
    /// booked record has that id.
    async fn cancel(&self, id: Ulid) -> Result<bool, StoreError>;
}
