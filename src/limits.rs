//! Hard limits on caller-supplied input and internal queues.

/// Largest catalog accepted at startup.
pub const MAX_SLOTS: usize = 1024;

/// Longest slot label, in bytes.
pub const MAX_SLOT_LABEL_LEN: usize = 64;

pub const MAX_USER_NAME_LEN: usize = 256;

/// RFC 5321 path limit.
pub const MAX_EMAIL_LEN: usize = 320;

/// Default bounded wait for a slot lock.
pub const DEFAULT_LOCK_WAIT_MS: u64 = 250;

/// Pending mirror writes before new ones are dropped as failures.
pub const MIRROR_QUEUE_CAPACITY: usize = 1024;

/// Pending ledger writer commands.
pub const LEDGER_QUEUE_CAPACITY: usize = 4096;

/// Largest single ledger entry accepted on replay.
pub const MAX_ENTRY_BYTES: usize = 64 * 1024;
