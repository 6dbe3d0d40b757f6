use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use slotbook::config::{Config, StoreKind};
use slotbook::engine::{Engine, EngineOptions};
use slotbook::limits::MIRROR_QUEUE_CAPACITY;
use slotbook::mirror::{DocumentMirror, MirrorStore};
use slotbook::reconcile;
use slotbook::store::{FileLedger, ReservationStore, TableLedger};

/// Background task that drops cancelled records once enough pile up.
async fn run_compactor(engine: Arc<Engine>, threshold: usize) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let cancelled = match engine.store().snapshot().await {
            Ok(ledger) => ledger.iter().filter(|b| !b.is_booked()).count(),
            Err(e) => {
                tracing::warn!("compactor skip: {e}");
                continue;
            }
        };
        if cancelled < threshold.max(1) {
            continue;
        }
        match engine.compact_ledger().await {
            Ok(n) => info!("compacted ledger, dropped {n} records"),
            // Busy slots: try again next tick.
            Err(e) => tracing::debug!("compactor skip: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    slotbook::observability::init(config.metrics_port);

    let catalog = Arc::new(config.catalog()?);
    let store: Arc<dyn ReservationStore> = match config.store {
        StoreKind::File => {
            // Ensure data directory exists
            std::fs::create_dir_all(&config.data_dir)?;
            Arc::new(FileLedger::open(&config.ledger_path())?)
        }
        StoreKind::Table => Arc::new(TableLedger::new()),
    };
    let mirror: Option<Arc<dyn MirrorStore>> = config
        .mirror_path
        .as_ref()
        .map(|p| Arc::new(DocumentMirror::new(p)) as Arc<dyn MirrorStore>);

    let options = EngineOptions {
        lock_wait: config.lock_wait,
        mirror_queue_capacity: MIRROR_QUEUE_CAPACITY,
    };
    let engine = Arc::new(Engine::new(catalog.clone(), store, mirror, options));

    info!("slotbook ready");
    info!("  store: {:?}", config.store);
    info!("  slots: {:?}", catalog.all().iter().map(|s| s.label.as_str()).collect::<Vec<_>>());
    let mirror_desc = match &config.mirror_path {
        Some(p) => p.display().to_string(),
        None => "disabled".to_string(),
    };
    info!("  mirror: {mirror_desc}");
    let metrics_desc = match config.metrics_port {
        Some(p) => format!("http://0.0.0.0:{p}/metrics"),
        None => "disabled".to_string(),
    };
    info!("  metrics: {metrics_desc}");

    let health = engine.health().await?;
    info!("{}/{} slots available", health.available_slots, health.total_slots);

    if let Some(reconciler) = engine.reconciler() {
        let every = config.reconcile_every;
        tokio::spawn(async move {
            reconcile::run_reconciler(reconciler, every).await;
        });
    }
    let compactor_engine = engine.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        run_compactor(compactor_engine, threshold).await;
    });

    // Graceful shutdown on SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");

    // Give queued mirror writes up to 10s to land.
    info!("draining mirror queue...");
    if tokio::time::timeout(Duration::from_secs(10), engine.flush_mirror()).await.is_err() {
        tracing::warn!("mirror drain timeout, {} failures so far", engine.mirror_failures());
    }

    info!("slotbook stopped");
    Ok(())
}
