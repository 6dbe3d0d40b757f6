//! Reply shapes handed to the transport layer. They serialize to the JSON
//! the booking endpoints return.

use serde::Serialize;

use crate::engine::EngineError;
use crate::model::{Booking, Ms};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookedBy {
    pub user_name: String,
    pub user_email: String,
    pub created_at: Ms,
}

impl From<&Booking> for BookedBy {
    fn from(b: &Booking) -> Self {
        Self {
            user_name: b.user_name.clone(),
            user_email: b.user_email.clone(),
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub id: u32,
    pub label: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_by: Option<BookedBy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableSlot {
    pub id: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reason {
    pub code: &'static str,
    pub message: String,
}

impl From<&EngineError> for Reason {
    fn from(e: &EngineError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<Booking>,
}

impl From<Result<Booking, EngineError>> for BookReply {
    fn from(result: Result<Booking, EngineError>) -> Self {
        match result {
            Ok(booking) => Self { ok: true, reason: None, booking: Some(booking) },
            Err(e) => Self { ok: false, reason: Some(Reason::from(&e)), booking: None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl<T> From<Result<T, EngineError>> for CancelReply {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(_) => Self { ok: true, reason: None },
            Err(e) => Self { ok: false, reason: Some(Reason::from(&e)) },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub total_slots: usize,
    pub available_slots: usize,
    pub mirror_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Slot, SlotRef};
    use serde_json::json;

    #[test]
    fn available_slot_omits_booked_by() {
        let view = SlotView {
            id: 1,
            label: "10:00-11:00".into(),
            available: true,
            booked_by: None,
        };
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({"id": 1, "label": "10:00-11:00", "available": true})
        );
    }

    #[test]
    fn failed_book_reply_carries_reason_only() {
        let reply = BookReply::from(Err(EngineError::AlreadyBooked(0)));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "ok": false,
                "reason": {"code": "already_booked", "message": "slot 0 already booked"}
            })
        );
    }

    #[test]
    fn ok_book_reply_carries_booking() {
        let slot = Slot { id: 0, label: "09:00-10:00".into() };
        let booking = Booking::new(&slot, "Mario".into(), "m@x.com".into());
        let value = serde_json::to_value(BookReply::from(Ok(booking))).unwrap();
        assert_eq!(value["ok"], json!(true));
        assert!(value.get("reason").is_none());
        assert_eq!(value["booking"]["slot_id"], json!(0));
        assert_eq!(value["booking"]["status"], json!("booked"));
    }

    #[test]
    fn cancel_reply_for_invalid_slot() {
        let reply = CancelReply::from(Err::<(), _>(EngineError::InvalidSlot(SlotRef::Id(-1))));
        assert!(!reply.ok);
        assert_eq!(reply.reason.unwrap().code, "invalid_slot");
    }

    #[test]
    fn slot_ref_accepts_number_or_label() {
        let by_id: SlotRef = serde_json::from_value(json!(2)).unwrap();
        let by_label: SlotRef = serde_json::from_value(json!("11:00-12:00")).unwrap();
        assert_eq!(by_id, SlotRef::Id(2));
        assert_eq!(by_label, SlotRef::Label("11:00-12:00".into()));
    }
}
