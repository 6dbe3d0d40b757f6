use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::catalog::SlotCatalog;
use crate::mirror::{MirrorError, MirrorStore};
use crate::model::{BookingStatus, SlotRef};
use crate::observability::DRIFT_RECORDS;
use crate::store::{ReservationStore, StoreError};

/// Identity of a record for comparison across primary and mirror.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// `None` when a mirror label no longer names a catalog slot.
    pub slot_id: Option<u32>,
    pub user_email: String,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drift {
    pub only_in_primary: Vec<RecordKey>,
    pub only_in_mirror: Vec<RecordKey>,
}

impl Drift {
    pub fn is_empty(&self) -> bool {
        self.only_in_primary.is_empty() && self.only_in_mirror.is_empty()
    }

    pub fn len(&self) -> usize {
        self.only_in_primary.len() + self.only_in_mirror.len()
    }
}

#[derive(Debug)]
pub enum ReconcileError {
    Store(StoreError),
    Mirror(MirrorError),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Store(e) => write!(f, "reading primary: {e}"),
            ReconcileError::Mirror(e) => write!(f, "reading mirror: {e}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Compares the ledger with its mirror. Reports drift; never repairs it.
pub struct Reconciler {
    catalog: Arc<SlotCatalog>,
    store: Arc<dyn ReservationStore>,
    mirror: Arc<dyn MirrorStore>,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<SlotCatalog>,
        store: Arc<dyn ReservationStore>,
        mirror: Arc<dyn MirrorStore>,
    ) -> Self {
        Self { catalog, store, mirror }
    }

    /// Records present on one side only. A cancelled record counts the same
    /// as an absent one, whichever way the backend stores cancellation.
    pub async fn diff(&self) -> Result<Drift, ReconcileError> {
        let primary: BTreeSet<RecordKey> = self
            .store
            .snapshot()
            .await
            .map_err(ReconcileError::Store)?
            .into_iter()
            .filter(|b| b.is_booked())
            .map(|b| RecordKey {
                slot_id: Some(b.slot_id),
                user_email: b.user_email,
                status: b.status,
            })
            .collect();

        let mirror: BTreeSet<RecordKey> = self
            .mirror
            .snapshot()
            .await
            .map_err(ReconcileError::Mirror)?
            .into_iter()
            .filter(|r| r.status == BookingStatus::Booked)
            .map(|r| RecordKey {
                slot_id: self
                    .catalog
                    .resolve(&SlotRef::Label(r.label))
                    .ok()
                    .map(|s| s.id),
                user_email: r.user_email,
                status: r.status,
            })
            .collect();

        Ok(Drift {
            only_in_primary: primary.difference(&mirror).cloned().collect(),
            only_in_mirror: mirror.difference(&primary).cloned().collect(),
        })
    }
}

/// Background task that periodically reports primary/mirror drift.
pub async fn run_reconciler(reconciler: Reconciler, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match reconciler.diff().await {
            Ok(drift) if drift.is_empty() => {
                metrics::gauge!(DRIFT_RECORDS).set(0.0);
                tracing::debug!("mirror in sync");
            }
            Ok(drift) => {
                metrics::gauge!(DRIFT_RECORDS).set(drift.len() as f64);
                warn!(
                    "mirror drift: {} only in primary, {} only in mirror",
                    drift.only_in_primary.len(),
                    drift.only_in_mirror.len()
                );
                for key in &drift.only_in_primary {
                    info!(
                        "  primary only: slot {:?} {} ({})",
                        key.slot_id,
                        key.user_email,
                        key.status.as_str()
                    );
                }
                for key in &drift.only_in_mirror {
                    info!(
                        "  mirror only: slot {:?} {} ({})",
                        key.slot_id,
                        key.user_email,
                        key.status.as_str()
                    );
                }
            }
            Err(e) => warn!("reconcile skipped: {e}"),
        }
    }
}
