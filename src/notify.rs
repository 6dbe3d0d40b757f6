use tokio::sync::broadcast;

use crate::model::Booking;

const CHANNEL_CAPACITY: usize = 256;

/// Which mirror operation an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOp {
    Put,
    Remove,
}

impl MirrorOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorOp::Put => "put",
            MirrorOp::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Booked(Booking),
    Cancelled(Booking),
    /// A mirror write was attempted (or dropped) and did not land.
    MirrorWriteFailed {
        op: MirrorOp,
        label: String,
        user_email: String,
        reason: String,
    },
}

/// In-process broadcast of engine events.
pub struct EventHub {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}
