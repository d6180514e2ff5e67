mod config;
use config::ProbeConfig;
use std::sync::Arc;
use std::time::Duration;
use steelsight_core::{
    CacheBackend, CacheDebugSnapshot, HttpBackend, HttpImageLoader, ImageLoader,
    PrefetchCacheStore, PrefetchContext, PrefetchOrchestrator, RunOutcome,
};
use tokio::signal;
use tracing::{info, warn};

/// Printed output: the snapshot tagged with the line it was taken on
#[derive(serde::Serialize)]
struct SnapshotReport<'a> {
    line: &'a str,
    snapshot: &'a CacheDebugSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,steelsight_core=info,cache_probe=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Load configuration (defaults + env + optional TOML overlay)
    let mut cfg = ProbeConfig::load();
    info!(target = "cache_probe", base_url = %cfg.backend.base_url, line = %cfg.line, "Starting cache probe");

    let backend: Arc<dyn CacheBackend> = Arc::new(HttpBackend::new(cfg.backend.clone())?);
    let loader: Arc<dyn ImageLoader> = Arc::new(HttpImageLoader::new(&cfg.backend)?);

    if cfg.use_server_settings {
        match backend.cache_settings().await {
            Ok(settings) => cfg.prefetch.apply_settings(&settings),
            Err(e) => warn!(target = "cache_probe", error = %e, "Cache settings unavailable; keeping local limits"),
        }
    }

    // Visible records come from the server-side cache record list
    let visible: Vec<u64> = match backend.cache_records(cfg.prefetch.record_limit).await {
        Ok(records) => records.into_iter().map(|r| r.seq_no).collect(),
        Err(e) => {
            warn!(target = "cache_probe", error = %e, "Cache record list unavailable");
            Vec::new()
        }
    };

    let store = PrefetchCacheStore::create(cfg.prefetch.log_capacity);
    let orchestrator = PrefetchOrchestrator::new(Arc::clone(&store), backend, loader);
    let ctx = PrefetchContext::from_config(&cfg.prefetch, visible);

    match orchestrator.run(&ctx).await {
        RunOutcome::Completed(report) => info!(
            target = "cache_probe",
            seq_no = ?report.seq_no,
            tiles = report.tiles_enqueued,
            defects = report.defects_enqueued,
            aborted = ?report.aborted,
            "Prefetch enqueued"
        ),
        other => info!(target = "cache_probe", outcome = ?other, "Nothing to prefetch"),
    }

    tokio::select! {
        res = tokio::time::timeout(Duration::from_millis(cfg.drain_timeout_ms), store.wait_idle()) => {
            if res.is_err() {
                warn!(target = "cache_probe", in_flight = store.in_flight(), "Timed out waiting for image loads");
            }
        }
        _ = signal::ctrl_c() => {
            info!(target = "cache_probe", "Interrupted; printing partial snapshot");
        }
    }

    let snapshot = store.snapshot().await;
    let report = SnapshotReport {
        line: &cfg.line,
        snapshot: &snapshot,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    store.dispose().await;
    Ok(())
}
