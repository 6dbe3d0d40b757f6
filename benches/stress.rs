use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use slotbook::catalog::SlotCatalog;
use slotbook::engine::{Engine, EngineError, EngineOptions};
use slotbook::store::{FileLedger, ReservationStore, TableLedger};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn bench_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slotbook_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).expect("create bench dir");
    dir
}

fn catalog(n: usize) -> Arc<SlotCatalog> {
    Arc::new(SlotCatalog::new((0..n).map(|i| format!("slot-{i:04}"))).expect("catalog"))
}

/// Book and cancel one slot over and over from a single caller.
async fn phase1_sequential(engine: &Engine) {
    let n = 1000;
    let mut latencies = Vec::with_capacity(n * 2);
    let start = Instant::now();
    for i in 0..n {
        let email = format!("seq{i}@x.com");
        let t = Instant::now();
        engine.book(0, "seq", &email).await.expect("book");
        latencies.push(t.elapsed());
        let t = Instant::now();
        engine.cancel(0, &email).await.expect("cancel");
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = (n * 2) as f64 / elapsed.as_secs_f64();
    println!("  {} ops in {:.2}s = {ops:.0} ops/sec", n * 2, elapsed.as_secs_f64());
    print_latency("book+cancel", &mut latencies);
}

/// Many callers racing for the same few slots.
async fn phase2_contention(engine: Arc<Engine>, slots: usize, callers: usize) {
    let start = Instant::now();
    let mut handles = Vec::with_capacity(callers);
    for i in 0..callers {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            let t = Instant::now();
            let r = eng
                .book((i % slots) as i64, "racer", &format!("r{i}@x.com"))
                .await;
            (t.elapsed(), r)
        }));
    }

    let mut won = Vec::new();
    let mut lost = Vec::new();
    let mut contended = 0usize;
    for h in handles {
        let (latency, result) = h.await.expect("task");
        match result {
            Ok(_) => won.push(latency),
            Err(EngineError::AlreadyBooked(_)) => lost.push(latency),
            Err(EngineError::SlotContended(_)) => contended += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    println!(
        "  {callers} callers over {slots} slots in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    println!(
        "  {} won, {} already booked, {contended} contended",
        won.len(),
        lost.len()
    );
    assert!(won.len() <= slots, "more winners than slots");
    print_latency("winners", &mut won);
    print_latency("losers", &mut lost);
}

/// Status reads while writers churn on other slots.
async fn phase3_read_under_load(engine: Arc<Engine>, slots: usize) {
    let writer = {
        let eng = engine.clone();
        tokio::spawn(async move {
            for i in 0..500 {
                let slot = (1 + i % (slots - 1)) as i64;
                let email = format!("w{i}@x.com");
                if eng.book(slot, "writer", &email).await.is_ok() {
                    let _ = eng.cancel(slot, &email).await;
                }
            }
        })
    };

    let mut latencies = Vec::new();
    while !writer.is_finished() {
        let t = Instant::now();
        let status = engine.list_slots().await.expect("list");
        latencies.push(t.elapsed());
        assert_eq!(status.len(), slots);
        tokio::task::yield_now().await;
    }
    writer.await.expect("writer");
    print_latency("list_slots", &mut latencies);
}

async fn run(label: &str, open_store: impl Fn(&str) -> Arc<dyn ReservationStore>) {
    let slots = 16;
    let options = EngineOptions {
        lock_wait: Duration::from_secs(5),
        ..EngineOptions::default()
    };
    let engine = Arc::new(Engine::new(catalog(slots), open_store("churn"), None, options.clone()));

    println!("\n[{label}] phase 1: sequential book/cancel");
    phase1_sequential(&engine).await;
    println!("\n[{label}] phase 2: contention");
    phase2_contention(engine.clone(), slots, 2000).await;
    let dropped = engine.compact_ledger().await.expect("compact");
    println!("  compacted {dropped} cancelled records");

    // Phase 2 leaves every slot taken, so reads run against a fresh ledger.
    let fresh = Arc::new(Engine::new(catalog(slots), open_store("reads"), None, options));
    println!("\n[{label}] phase 3: reads under write load");
    phase3_read_under_load(fresh, slots).await;
}

#[tokio::main]
async fn main() {
    println!("=== slotbook stress benchmark ===");

    let dir = bench_dir();
    run("file", |name| {
        let ledger = FileLedger::open(&dir.join(format!("{name}.ledger"))).expect("open ledger");
        Arc::new(ledger) as Arc<dyn ReservationStore>
    })
    .await;
    run("table", |_| Arc::new(TableLedger::new()) as Arc<dyn ReservationStore>).await;

    let _ = std::fs::remove_dir_all(&dir);
    println!("\n=== benchmark complete ===");
}
