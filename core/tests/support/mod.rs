//! Hand-written test doubles for the backend and the image loader.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use steelsight_core::backend::{build_defect_url, build_tile_url, CacheBackend};
use steelsight_core::model::{
    CacheRecord, CacheSettings, CacheStatus, DefectInfo, RecordMeta, Surface, SurfaceImage,
    TileDefaults, TileRequest, TilingInfo,
};
use steelsight_core::{ImageLoader, LoadResult, Result, SteelSightError};
use tokio::sync::{Mutex, Notify};

pub const BASE: &str = "http://mock";

/// Tile coordinates in the order the orchestrator asked for their URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCall {
    pub surface: Surface,
    pub level: u32,
    pub x: u64,
    pub y: u64,
}

pub struct MockBackend {
    pub tiling: TilingInfo,
    pub metas: HashMap<u64, RecordMeta>,
    pub defects: HashMap<u64, Vec<DefectInfo>>,
    pub current_seq: Option<u64>,
    pub fail_meta: bool,
    pub fail_defects: bool,
    /// When set, `tiling_info` parks until notified
    pub gate: Option<Arc<Notify>>,
    pub tiling_calls: AtomicUsize,
    pub tile_calls: std::sync::Mutex<Vec<TileCall>>,
}

impl MockBackend {
    pub fn new(tile_size: u32, max_level: u32) -> Self {
        Self {
            tiling: TilingInfo {
                tile: TileDefaults {
                    default_tile_size: tile_size,
                    max_level,
                },
            },
            metas: HashMap::new(),
            defects: HashMap::new(),
            current_seq: None,
            fail_meta: false,
            fail_defects: false,
            gate: None,
            tiling_calls: AtomicUsize::new(0),
            tile_calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register a record whose given surfaces have a `width x height` mosaic
    pub fn with_record(mut self, seq_no: u64, surfaces: &[Surface], width: u64, height: u64) -> Self {
        let surface_images = surfaces
            .iter()
            .map(|s| SurfaceImage {
                surface: *s,
                image_width: width,
                image_height: height / 4,
                frame_count: 4,
            })
            .collect();
        self.metas.insert(seq_no, RecordMeta { surface_images });
        self
    }

    pub fn with_defects(mut self, seq_no: u64, ids: &[u64]) -> Self {
        let list = ids
            .iter()
            .map(|id| DefectInfo {
                id: serde_json::json!(id),
                surface: Some(Surface::Top),
            })
            .collect();
        self.defects.insert(seq_no, list);
        self
    }

    pub fn tile_calls(&self) -> Vec<TileCall> {
        self.tile_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheBackend for MockBackend {
    async fn tiling_info(&self) -> Result<TilingInfo> {
        self.tiling_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.tiling.clone())
    }

    async fn record_meta(&self, seq_no: u64) -> Result<RecordMeta> {
        if self.fail_meta {
            return Err(SteelSightError::Backend("meta unavailable".into()));
        }
        self.metas
            .get(&seq_no)
            .cloned()
            .ok_or_else(|| SteelSightError::Backend(format!("no record {seq_no}")))
    }

    async fn defects(&self, seq_no: u64) -> Result<Vec<DefectInfo>> {
        if self.fail_defects {
            return Err(SteelSightError::Backend("defects unavailable".into()));
        }
        Ok(self.defects.get(&seq_no).cloned().unwrap_or_default())
    }

    async fn cache_status(&self) -> Result<CacheStatus> {
        Ok(CacheStatus {
            current_seq_no: self.current_seq,
            running: false,
            cached_records: None,
        })
    }

    async fn cache_records(&self, limit: usize) -> Result<Vec<CacheRecord>> {
        let mut seqs: Vec<u64> = self.metas.keys().copied().collect();
        seqs.sort_unstable_by(|a, b| b.cmp(a));
        Ok(seqs
            .into_iter()
            .take(limit)
            .map(|seq_no| CacheRecord {
                seq_no,
                cached: true,
            })
            .collect())
    }

    async fn cache_settings(&self) -> Result<CacheSettings> {
        Ok(CacheSettings::default())
    }

    fn tile_url(&self, req: &TileRequest<'_>) -> String {
        self.tile_calls.lock().unwrap().push(TileCall {
            surface: req.surface,
            level: req.level,
            x: req.tile_x,
            y: req.tile_y,
        });
        build_tile_url(BASE, req)
    }

    fn defect_url(&self, defect_id: &str, surface: Option<Surface>) -> String {
        build_defect_url(BASE, defect_id, surface)
    }
}

/// Loader that answers instantly with a fixed size and records every URL
pub struct MockLoader {
    pub calls: Mutex<Vec<String>>,
    pub elapsed_ms: f64,
    pub size: (u32, u32),
    /// URLs containing any of these fragments fail
    pub fail_on: Vec<String>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            elapsed_ms: 4.0,
            size: (256, 256),
            fail_on: Vec::new(),
        }
    }

    pub fn failing(fragment: &str) -> Self {
        Self {
            fail_on: vec![fragment.to_string()],
            ..Self::new()
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ImageLoader for MockLoader {
    async fn load(&self, url: &str) -> LoadResult {
        self.calls.lock().await.push(url.to_string());
        if self.fail_on.iter().any(|f| url.contains(f.as_str())) {
            return LoadResult::Failed;
        }
        LoadResult::Loaded {
            elapsed_ms: self.elapsed_ms,
            width: self.size.0,
            height: self.size.1,
        }
    }
}
