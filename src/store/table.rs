use async_trait::async_trait;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus};

use super::{ReservationStore, StoreError};

/// Table-backed ledger with native per-record update: cancelling flags the
/// row instead of rewriting the table. Rows keep insertion order.
///
/// Holds nothing on disk; it stands in for a database table whose client
/// wiring lives outside this crate.
#[derive(Default)]
pub struct TableLedger {
    rows: RwLock<Vec<Booking>>,
}

impl TableLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Booking>) -> Self {
        Self { rows: RwLock::new(rows) }
    }
}

#[async_trait]
impl ReservationStore for TableLedger {
    async fn snapshot(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        self.rows.write().await.push(booking);
        Ok(())
    }

    async fn replace_all(&self, bookings: Vec<Booking>) -> Result<(), StoreError> {
        *self.rows.write().await = bookings;
        Ok(())
    }

    async fn cancel(&self, id: Ulid) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|b| b.id == id && b.is_booked()) {
            Some(row) => {
                row.status = BookingStatus::Cancelled;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
