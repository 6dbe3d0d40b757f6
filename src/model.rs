use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// A bookable time slot. Defined once at startup by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub id: u32,
    pub label: String,
}

/// How a caller names a slot: by ordinal id or by its time label.
///
/// Deserializes from a JSON number or string. Ids are signed so that a
/// negative id reaches the catalog and is rejected there as an invalid slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRef {
    Id(i64),
    Label(String),
}

impl From<i64> for SlotRef {
    fn from(id: i64) -> Self {
        SlotRef::Id(id)
    }
}

impl From<i32> for SlotRef {
    fn from(id: i32) -> Self {
        SlotRef::Id(id as i64)
    }
}

impl From<u32> for SlotRef {
    fn from(id: u32) -> Self {
        SlotRef::Id(id as i64)
    }
}

impl From<&str> for SlotRef {
    fn from(label: &str) -> Self {
        SlotRef::Label(label.to_string())
    }
}

impl From<String> for SlotRef {
    fn from(label: String) -> Self {
        SlotRef::Label(label)
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRef::Id(id) => write!(f, "#{id}"),
            SlotRef::Label(label) => write!(f, "{label:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// One claim on one slot. This is also the ledger record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    /// Canonical slot reference. `label` is carried for readers of the record.
    pub slot_id: u32,
    pub label: String,
    pub user_name: String,
    pub user_email: String,
    pub created_at: Ms,
    pub status: BookingStatus,
}

impl Booking {
    pub fn new(slot: &Slot, user_name: String, user_email: String) -> Self {
        Self {
            id: Ulid::new(),
            slot_id: slot.id,
            label: slot.label.clone(),
            user_name,
            user_email,
            created_at: now_ms(),
            status: BookingStatus::Booked,
        }
    }

    pub fn is_booked(&self) -> bool {
        self.status == BookingStatus::Booked
    }

    pub fn holds(&self, slot: &Slot) -> bool {
        self.is_booked() && self.slot_id == slot.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_match_serialized_form() {
        for status in [BookingStatus::Booked, BookingStatus::Cancelled] {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::from(status.as_str())
            );
        }
    }

    #[test]
    fn holds_needs_same_slot_and_booked() {
        let slot = Slot { id: 1, label: "10:00-11:00".into() };
        let other = Slot { id: 2, label: "11:00-12:00".into() };
        let mut b = Booking::new(&slot, "Mario".into(), "m@x.com".into());
        assert!(b.holds(&slot));
        assert!(!b.holds(&other));
        b.status = BookingStatus::Cancelled;
        assert!(!b.holds(&slot));
    }
}
