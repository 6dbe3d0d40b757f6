mod document;
mod fanout;
mod memory;

pub use document::DocumentMirror;
pub use fanout::MirrorFanout;
pub use memory::MemoryMirror;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Booking, BookingStatus, Ms, Slot};

/// The mirror's native document. Keyed by `(label, user_email)`: the
/// document store names slots by their time label, not by ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub label: String,
    pub user_name: String,
    pub user_email: String,
    pub created_at: Ms,
    pub status: BookingStatus,
}

impl From<&Booking> for MirrorRecord {
    fn from(b: &Booking) -> Self {
        Self {
            label: b.label.clone(),
            user_name: b.user_name.clone(),
            user_email: b.user_email.clone(),
            created_at: b.created_at,
            status: b.status,
        }
    }
}

#[derive(Debug)]
pub enum MirrorError {
    /// The backend rejected or could not complete the write.
    WriteFailed(String),
    /// The fanout queue was full; the write was dropped.
    QueueFull,
    /// The fanout task is gone.
    Closed,
}

impl std::fmt::Display for MirrorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MirrorError::WriteFailed(e) => write!(f, "mirror write failed: {e}"),
            MirrorError::QueueFull => write!(f, "mirror write failed: queue full"),
            MirrorError::Closed => write!(f, "mirror write failed: fanout closed"),
        }
    }
}

impl std::error::Error for MirrorError {}

impl From<std::io::Error> for MirrorError {
    fn from(e: std::io::Error) -> Self {
        MirrorError::WriteFailed(e.to_string())
    }
}

/// Secondary, best-effort copy of the ledger. Never authoritative: nothing
/// here is read to decide availability.
///
/// Adapters receive canonical slots and translate them to their own key.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn put(&self, booking: &Booking) -> Result<(), MirrorError>;

    /// Remove the document for `slot` + `user_email`. Removing a missing
    /// document succeeds.
    async fn remove(&self, slot: &Slot, user_email: &str) -> Result<(), MirrorError>;

    async fn snapshot(&self) -> Result<Vec<MirrorRecord>, MirrorError>;
}
