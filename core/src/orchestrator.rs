// Prefetch orchestrator
//
// Works out which tiles and defect crops the active record needs and feeds
// them to the store. One run at a time per orchestrator: the Idle -> Running
// transition is a compare-and-swap and triggers that lose it are dropped.

use crate::backend::CacheBackend;
use crate::config::PrefetchConfig;
use crate::loader::ImageLoader;
use crate::model::{DefectInfo, PrefetchMeta, RecordMeta, Surface, TileRequest, TilingInfo};
use crate::store::PrefetchCacheStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorState {
    Idle,
    Running,
}

/// Inputs a run depends on; any change is a new trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchContext {
    /// Whether the cache diagnostics tab is the active one
    pub active_tab: bool,
    pub enabled: bool,
    pub tile_limit: usize,
    pub defect_limit: usize,
    pub view: String,
    /// Records shown in the cache record list, most relevant first
    pub visible_records: Vec<u64>,
}

impl PrefetchContext {
    pub fn from_config(cfg: &PrefetchConfig, visible_records: Vec<u64>) -> Self {
        Self {
            active_tab: true,
            enabled: cfg.enabled,
            tile_limit: cfg.tile_limit,
            defect_limit: cfg.defect_limit,
            view: cfg.view.clone(),
            visible_records,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Inactive,
    Disabled,
    LimitsSatisfied,
    NoTargetRecord,
}

/// What a completed run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub seq_no: Option<u64>,
    pub tile_attempts: usize,
    pub tiles_enqueued: usize,
    pub defect_attempts: usize,
    pub defects_enqueued: usize,
    /// Metadata error that ended the run early
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Skipped(SkipReason),
    /// Another run was in progress; this trigger was dropped
    Busy,
    Completed(RunReport),
}

/// Returns the orchestrator to Idle on every exit path
struct RunningGuard<'a>(&'a AtomicU8);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

/// Tile grid size of a mosaic at `level`, as `(cols, rows)`
pub fn tile_grid(mosaic_width: u64, mosaic_height: u64, tile_size: u32, level: u32) -> (u64, u64) {
    let virtual_size = 1u64
        .checked_shl(level)
        .and_then(|scale| scale.checked_mul(u64::from(tile_size.max(1))))
        .unwrap_or(u64::MAX);
    (
        mosaic_width.div_ceil(virtual_size),
        mosaic_height.div_ceil(virtual_size),
    )
}

pub struct PrefetchOrchestrator {
    store: Arc<PrefetchCacheStore>,
    backend: Arc<dyn CacheBackend>,
    loader: Arc<dyn ImageLoader>,
    state: AtomicU8,
}

impl PrefetchOrchestrator {
    pub fn new(
        store: Arc<PrefetchCacheStore>,
        backend: Arc<dyn CacheBackend>,
        loader: Arc<dyn ImageLoader>,
    ) -> Self {
        Self {
            store,
            backend,
            loader,
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn store(&self) -> &Arc<PrefetchCacheStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn state(&self) -> OrchestratorState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => OrchestratorState::Running,
            _ => OrchestratorState::Idle,
        }
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.state))
    }

    /// Run one prefetch pass for `ctx`.
    ///
    /// Metadata errors end the pass quietly; keys enqueued before the error
    /// stay cached and the error text is returned in the report.
    pub async fn run(&self, ctx: &PrefetchContext) -> RunOutcome {
        let Some(_running) = self.try_begin() else {
            debug!(target: "prefetch.orchestrator", "Run already in progress; trigger dropped");
            return RunOutcome::Busy;
        };

        if !ctx.active_tab {
            return RunOutcome::Skipped(SkipReason::Inactive);
        }
        if !ctx.enabled {
            return RunOutcome::Skipped(SkipReason::Disabled);
        }
        if self.store.tile_count() >= ctx.tile_limit
            && self.store.defect_count() >= ctx.defect_limit
        {
            return RunOutcome::Skipped(SkipReason::LimitsSatisfied);
        }

        let mut report = RunReport::default();
        if let Err(e) = self.prefetch(ctx, &mut report).await {
            debug!(target: "prefetch.orchestrator", seq_no = ?report.seq_no, error = %e, "Prefetch aborted");
            report.aborted = Some(e.to_string());
        }

        if report.seq_no.is_none() && report.aborted.is_none() {
            return RunOutcome::Skipped(SkipReason::NoTargetRecord);
        }

        info!(
            target: "prefetch.orchestrator",
            seq_no = ?report.seq_no,
            tiles = report.tiles_enqueued,
            defects = report.defects_enqueued,
            aborted = report.aborted.is_some(),
            "Prefetch run finished"
        );
        RunOutcome::Completed(report)
    }

    async fn prefetch(&self, ctx: &PrefetchContext, report: &mut RunReport) -> Result<()> {
        let tiling = self.backend.tiling_info().await?;

        let Some(seq_no) = self.resolve_target(ctx).await else {
            return Ok(());
        };
        report.seq_no = Some(seq_no);

        let meta = self.backend.record_meta(seq_no).await?;
        if self.store.tile_count() < ctx.tile_limit {
            self.enqueue_tiles(ctx, seq_no, &tiling, &meta, report);
        }

        if self.store.defect_count() < ctx.defect_limit {
            let defects = self.backend.defects(seq_no).await?;
            self.enqueue_defects(ctx, seq_no, &defects, report);
        }
        Ok(())
    }

    /// Backend's current record wins; otherwise the first visible one
    async fn resolve_target(&self, ctx: &PrefetchContext) -> Option<u64> {
        match self.backend.cache_status().await {
            Ok(status) if status.current_seq_no.is_some() => status.current_seq_no,
            Ok(_) => ctx.visible_records.first().copied(),
            Err(e) => {
                debug!(target: "prefetch.orchestrator", error = %e, "Cache status unavailable; using visible records");
                ctx.visible_records.first().copied()
            }
        }
    }

    fn enqueue_tiles(
        &self,
        ctx: &PrefetchContext,
        seq_no: u64,
        tiling: &TilingInfo,
        meta: &RecordMeta,
        report: &mut RunReport,
    ) {
        let tile_size = tiling.tile.default_tile_size;

        // Coarse levels first so an overview of every surface lands before detail
        'surfaces: for surface in Surface::ALL {
            let Some(image) = meta.surface(surface) else {
                continue;
            };
            let (width, height) = image.mosaic_size();
            if width == 0 || height == 0 {
                continue;
            }

            for level in (0..=tiling.tile.max_level).rev() {
                let (cols, rows) = tile_grid(width, height, tile_size, level);
                for tile_y in 0..rows {
                    for tile_x in 0..cols {
                        if self.store.tile_count() >= ctx.tile_limit {
                            break 'surfaces;
                        }
                        report.tile_attempts += 1;
                        let url = self.backend.tile_url(&TileRequest {
                            surface,
                            seq_no,
                            level,
                            tile_x,
                            tile_y,
                            tile_size,
                            view: &ctx.view,
                        });
                        if self.store.enqueue(
                            &self.loader,
                            url,
                            PrefetchMeta::tile(seq_no, surface, level),
                        ) {
                            report.tiles_enqueued += 1;
                        }
                    }
                }
            }
        }
    }

    fn enqueue_defects(
        &self,
        ctx: &PrefetchContext,
        seq_no: u64,
        defects: &[DefectInfo],
        report: &mut RunReport,
    ) {
        for defect in defects {
            if self.store.defect_count() >= ctx.defect_limit {
                break;
            }
            report.defect_attempts += 1;
            let url = self
                .backend
                .defect_url(&defect.id_string(), defect.surface);
            if self
                .store
                .enqueue(&self.loader, url, PrefetchMeta::defect(seq_no, defect.surface))
            {
                report.defects_enqueued += 1;
            }
        }
    }
}
