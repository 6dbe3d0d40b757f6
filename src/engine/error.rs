use crate::model::SlotRef;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Id outside the catalog or unknown label.
    InvalidSlot(SlotRef),
    /// Missing, empty or oversized required field.
    ValidationError(&'static str),
    AlreadyBooked(u32),
    /// No booked record for this slot with the given email.
    NotFound(u32),
    /// Slot lock not acquired within the bounded wait.
    SlotContended(u32),
    /// Primary ledger I/O failed; the operation was not applied.
    StoreUnavailable(String),
}

impl EngineError {
    /// Stable machine-readable reason, used in replies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidSlot(_) => "invalid_slot",
            EngineError::ValidationError(_) => "validation_error",
            EngineError::AlreadyBooked(_) => "already_booked",
            EngineError::NotFound(_) => "not_found",
            EngineError::SlotContended(_) => "slot_contended",
            EngineError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidSlot(r) => write!(f, "invalid slot: {r}"),
            EngineError::ValidationError(msg) => write!(f, "validation error: {msg}"),
            EngineError::AlreadyBooked(id) => write!(f, "slot {id} already booked"),
            EngineError::NotFound(id) => {
                write!(f, "no booking on slot {id} for that email")
            }
            EngineError::SlotContended(id) => write!(f, "slot {id} busy, retry"),
            EngineError::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::StoreUnavailable(e.to_string())
    }
}
