use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::{CatalogError, SlotCatalog, DEFAULT_SLOTS};
use crate::limits::DEFAULT_LOCK_WAIT_MS;

/// Which primary ledger backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    File,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownStore(String),
    Catalog(CatalogError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownStore(s) => {
                write!(f, "SLOTBOOK_STORE must be \"file\" or \"table\", got {s:?}")
            }
            ConfigError::Catalog(e) => write!(f, "SLOTBOOK_SLOTS: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub slots: Vec<String>,
    pub mirror_path: Option<PathBuf>,
    pub lock_wait: Duration,
    pub reconcile_every: Duration,
    /// Cancelled records tolerated before the ledger is compacted.
    pub compact_threshold: usize,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable numbers fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let number = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());

        let store = match get("SLOTBOOK_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("file") => StoreKind::File,
            Some("table") => StoreKind::Table,
            Some(other) => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        let slots: Vec<String> = match get("SLOTBOOK_SLOTS") {
            Some(list) if !list.trim().is_empty() => {
                list.split(',').map(|s| s.trim().to_string()).collect()
            }
            _ => DEFAULT_SLOTS.iter().map(|s| s.to_string()).collect(),
        };
        // Reject a bad catalog here rather than at first request.
        SlotCatalog::new(slots.iter().cloned()).map_err(ConfigError::Catalog)?;

        Ok(Self {
            data_dir: get("SLOTBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            store,
            slots,
            mirror_path: get("SLOTBOOK_MIRROR_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            lock_wait: Duration::from_millis(
                number("SLOTBOOK_LOCK_WAIT_MS").unwrap_or(DEFAULT_LOCK_WAIT_MS),
            ),
            reconcile_every: Duration::from_secs(
                number("SLOTBOOK_RECONCILE_SECS").filter(|&s| s > 0).unwrap_or(60),
            ),
            compact_threshold: number("SLOTBOOK_COMPACT_THRESHOLD").unwrap_or(100) as usize,
            metrics_port: get("SLOTBOOK_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
        })
    }

    pub fn catalog(&self) -> Result<SlotCatalog, ConfigError> {
        SlotCatalog::new(self.slots.iter().cloned()).map_err(ConfigError::Catalog)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("bookings.ledger")
    }
}
