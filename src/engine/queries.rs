use crate::api::{AvailableSlot, BookedBy, Health, SlotView};
use crate::model::*;
use crate::observability::SLOTS_AVAILABLE;

use super::{Engine, EngineError};

impl Engine {
    /// True iff no booked record holds the slot. Reads a snapshot only.
    pub async fn is_available(&self, slot_ref: impl Into<SlotRef>) -> Result<bool, EngineError> {
        let slot_ref = slot_ref.into();
        let slot = self.catalog.resolve(&slot_ref)?;
        Ok(!self.ledger().await?.iter().any(|b| b.holds(slot)))
    }

    /// Every slot in catalog order with its state. `booked_by` is only filled
    /// for booked slots.
    pub async fn list_status(&self) -> Result<Vec<SlotView>, EngineError> {
        let ledger = self.ledger().await?;
        let mut available = 0usize;
        let views: Vec<SlotView> = self
            .catalog
            .all()
            .iter()
            .map(|slot| {
                let holder = ledger.iter().find(|b| b.holds(slot));
                if holder.is_none() {
                    available += 1;
                }
                SlotView {
                    id: slot.id,
                    label: slot.label.clone(),
                    available: holder.is_none(),
                    booked_by: holder.map(BookedBy::from),
                }
            })
            .collect();
        metrics::gauge!(SLOTS_AVAILABLE).set(available as f64);
        Ok(views)
    }

    pub async fn list_slots(&self) -> Result<Vec<SlotView>, EngineError> {
        self.list_status().await
    }

    pub async fn list_available(&self) -> Result<Vec<AvailableSlot>, EngineError> {
        Ok(self
            .list_status()
            .await?
            .into_iter()
            .filter(|v| v.available)
            .map(|v| AvailableSlot { id: v.id, label: v.label })
            .collect())
    }

    /// Whether `user_email` holds any slot. Exact match.
    pub async fn is_email_booked(&self, user_email: &str) -> Result<bool, EngineError> {
        Ok(self
            .ledger()
            .await?
            .iter()
            .any(|b| b.is_booked() && b.user_email == user_email))
    }

    pub async fn health(&self) -> Result<Health, EngineError> {
        let status = self.list_status().await?;
        Ok(Health {
            total_slots: status.len(),
            available_slots: status.iter().filter(|v| v.available).count(),
            mirror_failures: self.mirror_failures(),
        })
    }
}
