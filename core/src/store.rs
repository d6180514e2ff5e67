//! Prefetch cache store.
//!
//! Owns everything the cache diagnostics view tracks for one session:
//! - the two de-duplication buckets (tile and defect keys)
//! - the per-record ledger
//! - aggregate load statistics
//! - the capped prefetch log
//!
//! The store is an explicit object (`create -> reset -> dispose`) shared by
//! `Arc` between the orchestrator and the spawned image loads.

use crate::event_log::{describe, LogData, LogEntry, PrefetchLog};
use crate::ledger::{CacheLedger, LedgerSummary, PrefetchRecord};
use crate::loader::{ImageLoader, LoadResult};
use crate::model::{PrefetchKind, PrefetchMeta};
use crate::stats::{AggregateStats, StatsSnapshot};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, info};

struct StoreState {
    ledger: CacheLedger,
    stats: AggregateStats,
    log: PrefetchLog,
}

/// Serializable view of the whole store for the diagnostics page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDebugSnapshot {
    pub tile_keys: usize,
    pub defect_keys: usize,
    pub in_flight: usize,
    pub stats: StatsSnapshot,
    pub records: Vec<LedgerSummary>,
    pub log: Vec<LogEntry>,
}

pub struct PrefetchCacheStore {
    tile_keys: DashSet<String>,
    defect_keys: DashSet<String>,
    state: Mutex<StoreState>,
    in_flight: AtomicUsize,
    idle: Notify,
    disposed: AtomicBool,
}

/// Decrements the in-flight counter even if the load task panics
struct InFlightGuard(Arc<PrefetchCacheStore>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl PrefetchCacheStore {
    pub fn create(log_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            tile_keys: DashSet::new(),
            defect_keys: DashSet::new(),
            state: Mutex::new(StoreState {
                ledger: CacheLedger::new(),
                stats: AggregateStats::new(),
                log: PrefetchLog::new(log_capacity),
            }),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            disposed: AtomicBool::new(false),
        })
    }

    fn bucket(&self, kind: PrefetchKind) -> &DashSet<String> {
        match kind {
            PrefetchKind::Tile => &self.tile_keys,
            PrefetchKind::Defect => &self.defect_keys,
        }
    }

    /// Request `url` once per bucket.
    ///
    /// Returns `false` without side effects when the key is already known (or
    /// the store is disposed). Otherwise records the key, spawns one load and
    /// returns `true`. The load's outcome is applied via [`Self::complete`].
    pub fn enqueue(
        self: &Arc<Self>,
        loader: &Arc<dyn ImageLoader>,
        url: String,
        meta: PrefetchMeta,
    ) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        if !self.bucket(meta.kind).insert(url.clone()) {
            return false;
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(Arc::clone(self));
        let loader = Arc::clone(loader);
        tokio::spawn(async move {
            let result = loader.load(&url).await;
            guard.0.complete(&meta, result).await;
            drop(guard);
        });
        true
    }

    /// Apply one load outcome; failures leave ledger, stats and log untouched
    pub async fn complete(&self, meta: &PrefetchMeta, result: LoadResult) {
        let LoadResult::Loaded {
            elapsed_ms,
            width,
            height,
        } = result
        else {
            return;
        };

        let data = LogData {
            seq_no: meta.seq_no,
            kind: meta.kind,
            surface: meta.surface,
            level: meta.level,
            elapsed_ms,
            width,
            height,
        };
        let message = describe(&data);
        debug!(target: "prefetch.store", "{}", message);

        let mut state = self.state.lock().await;
        state
            .ledger
            .record(meta.seq_no, meta.kind, meta.surface, meta.level);
        state.stats.observe(elapsed_ms, width, height);
        state.log.append(message, data);
    }

    /// Clear buckets, ledger, stats and log. In-flight loads are not cancelled.
    pub async fn reset(&self) {
        self.tile_keys.clear();
        self.defect_keys.clear();
        let mut state = self.state.lock().await;
        state.ledger.clear();
        state.stats.clear();
        state.log.clear();
        info!(target: "prefetch.store", "Prefetch cache cleared");
    }

    /// Reset and refuse further enqueues
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.reset().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn contains(&self, kind: PrefetchKind, url: &str) -> bool {
        self.bucket(kind).contains(url)
    }

    pub fn tile_count(&self) -> usize {
        self.tile_keys.len()
    }

    pub fn defect_count(&self) -> usize {
        self.defect_keys.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once no spawned load is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub async fn stats(&self) -> StatsSnapshot {
        self.state.lock().await.stats.snapshot()
    }

    pub async fn ledger_summary(&self) -> Vec<LedgerSummary> {
        self.state.lock().await.ledger.summary()
    }

    pub async fn record_detail(&self, seq_no: u64) -> Option<PrefetchRecord> {
        self.state.lock().await.ledger.get(seq_no).cloned()
    }

    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.state.lock().await.log.entries()
    }

    pub async fn subscribe_log(&self) -> broadcast::Receiver<LogEntry> {
        self.state.lock().await.log.subscribe()
    }

    pub async fn snapshot(&self) -> CacheDebugSnapshot {
        let state = self.state.lock().await;
        CacheDebugSnapshot {
            tile_keys: self.tile_keys.len(),
            defect_keys: self.defect_keys.len(),
            in_flight: self.in_flight(),
            stats: state.stats.snapshot(),
            records: state.ledger.summary(),
            log: state.log.entries(),
        }
    }
}
