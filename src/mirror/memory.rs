use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::{Booking, Slot};

use super::{MirrorError, MirrorRecord, MirrorStore};

/// Document store held in memory, keyed by `(label, user_email)`.
#[derive(Default)]
pub struct MemoryMirror {
    docs: DashMap<(String, String), MirrorRecord>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl MirrorStore for MemoryMirror {
    async fn put(&self, booking: &Booking) -> Result<(), MirrorError> {
        let record = MirrorRecord::from(booking);
        self.docs
            .insert((record.label.clone(), record.user_email.clone()), record);
        Ok(())
    }

    async fn remove(&self, slot: &Slot, user_email: &str) -> Result<(), MirrorError> {
        self.docs
            .remove(&(slot.label.clone(), user_email.to_string()));
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<MirrorRecord>, MirrorError> {
        let mut records: Vec<MirrorRecord> = self.docs.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| (&a.label, &a.user_email).cmp(&(&b.label, &b.user_email)));
        Ok(records)
    }
}
