use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;
use crate::notify::EngineEvent;
use crate::observability::{BOOKINGS_TOTAL, CANCELLATIONS_TOTAL};

use super::{Engine, EngineError};

fn validate_user(user_name: &str, user_email: &str) -> Result<(), EngineError> {
    if user_name.trim().is_empty() {
        return Err(EngineError::ValidationError("user_name is required"));
    }
    if user_email.trim().is_empty() {
        return Err(EngineError::ValidationError("user_email is required"));
    }
    if user_name.len() > MAX_USER_NAME_LEN {
        return Err(EngineError::ValidationError("user_name too long"));
    }
    if user_email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::ValidationError("user_email too long"));
    }
    Ok(())
}

fn outcome<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    }
}

impl Engine {
    /// Claim a free slot for a user.
    ///
    /// Fails `AlreadyBooked` when the slot is taken, `StoreUnavailable` when the
    /// ledger write fails (nothing is recorded). A mirror failure after the
    /// ledger write does not fail the booking.
    pub async fn book(
        &self,
        slot_ref: impl Into<SlotRef>,
        user_name: &str,
        user_email: &str,
    ) -> Result<Booking, EngineError> {
        let result = self.try_book(slot_ref.into(), user_name, user_email).await;
        metrics::counter!(BOOKINGS_TOTAL, "outcome" => outcome(&result)).increment(1);
        result
    }

    async fn try_book(
        &self,
        slot_ref: SlotRef,
        user_name: &str,
        user_email: &str,
    ) -> Result<Booking, EngineError> {
        let slot = self.catalog.resolve(&slot_ref)?;
        validate_user(user_name, user_email)?;

        let guard = self.lock_slot(slot).await?;
        let store = self.store.clone();
        let held = slot.clone();
        let booking = Booking::new(slot, user_name.to_string(), user_email.to_string());
        let booking = Self::run_locked(guard, async move {
            // Re-check under the lock: whatever the caller saw earlier is stale.
            if store.snapshot().await?.iter().any(|b| b.holds(&held)) {
                debug!("book rejected: slot {} already booked", held.id);
                return Err(EngineError::AlreadyBooked(held.id));
            }
            store.append(booking.clone()).await?;
            Ok(booking)
        })
        .await?;

        info!("slot {} ({}) booked by {}", slot.id, slot.label, booking.user_name);
        if let Some(mirror) = &self.mirror {
            mirror.put(&booking);
        }
        self.events.send(EngineEvent::Booked(booking.clone()));
        Ok(booking)
    }

    /// Release the slot booked by `user_email`. The email must match exactly.
    ///
    /// Returns the booking as cancelled. Fails `NotFound` when the slot is free
    /// or held by someone else.
    pub async fn cancel(
        &self,
        slot_ref: impl Into<SlotRef>,
        user_email: &str,
    ) -> Result<Booking, EngineError> {
        let result = self.try_cancel(slot_ref.into(), user_email).await;
        metrics::counter!(CANCELLATIONS_TOTAL, "outcome" => outcome(&result)).increment(1);
        result
    }

    async fn try_cancel(
        &self,
        slot_ref: SlotRef,
        user_email: &str,
    ) -> Result<Booking, EngineError> {
        let slot = self.catalog.resolve(&slot_ref)?;

        let guard = self.lock_slot(slot).await?;
        let store = self.store.clone();
        let held = slot.clone();
        let email = user_email.to_string();
        let mut booking = Self::run_locked(guard, async move {
            let Some(booking) = store
                .snapshot()
                .await?
                .into_iter()
                .find(|b| b.holds(&held) && b.user_email == email)
            else {
                debug!("cancel rejected: no booking on slot {} for {email}", held.id);
                return Err(EngineError::NotFound(held.id));
            };
            if !store.cancel(booking.id).await? {
                return Err(EngineError::NotFound(held.id));
            }
            Ok(booking)
        })
        .await?;
        booking.status = BookingStatus::Cancelled;

        info!("slot {} ({}) cancelled for {user_email}", slot.id, slot.label);
        if let Some(mirror) = &self.mirror {
            mirror.remove(slot, user_email);
        }
        self.events.send(EngineEvent::Cancelled(booking.clone()));
        Ok(booking)
    }

    /// Drop cancelled records from the ledger. Returns how many were dropped.
    ///
    /// Takes every slot lock in ascending id order, so it waits out in-flight
    /// bookings and cannot deadlock with them.
    pub async fn compact_ledger(&self) -> Result<usize, EngineError> {
        let mut guards = Vec::with_capacity(self.catalog.len());
        for slot in self.catalog.all() {
            guards.push(self.lock_slot(slot).await?);
        }

        let store = self.store.clone();
        let dropped = Self::run_locked(guards, async move {
            let ledger = store.snapshot().await?;
            let before = ledger.len();
            let kept: Vec<Booking> = ledger.into_iter().filter(|b| b.is_booked()).collect();
            let dropped = before - kept.len();
            if dropped > 0 {
                store.replace_all(kept).await?;
            }
            Ok::<_, EngineError>(dropped)
        })
        .await?;
        if dropped > 0 {
            info!("ledger compacted: dropped {dropped} cancelled records");
        }
        Ok(dropped)
    }
}
