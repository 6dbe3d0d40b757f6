use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: book attempts. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "slotbook_bookings_total";

/// Counter: cancel attempts. Labels: outcome.
pub const CANCELLATIONS_TOTAL: &str = "slotbook_cancellations_total";

/// Histogram: time spent waiting for a slot lock, in seconds.
pub const LOCK_WAIT_SECONDS: &str = "slotbook_lock_wait_seconds";

// ── Ledger ──────────────────────────────────────────────────────

/// Histogram: ledger group-commit flush duration in seconds.
pub const LEDGER_FLUSH_DURATION_SECONDS: &str = "slotbook_ledger_flush_duration_seconds";

/// Histogram: ledger group-commit batch size (bookings per flush).
pub const LEDGER_FLUSH_BATCH_SIZE: &str = "slotbook_ledger_flush_batch_size";

/// Counter: whole-file ledger rewrites (cancel, replace).
pub const LEDGER_REWRITES_TOTAL: &str = "slotbook_ledger_rewrites_total";

// ── Mirror ──────────────────────────────────────────────────────

/// Counter: mirror writes that failed or were dropped. Labels: op.
pub const MIRROR_WRITE_FAILURES_TOTAL: &str = "slotbook_mirror_write_failures_total";

/// Gauge: records on only one side of primary/mirror at the last reconcile.
pub const DRIFT_RECORDS: &str = "slotbook_drift_records";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: slots currently free.
pub const SLOTS_AVAILABLE: &str = "slotbook_slots_available";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
