//! Shared value types: prefetch metadata and the backend wire shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical face of an inspected plate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Top,
    Bottom,
}

impl Surface {
    /// Fixed processing order for prefetch runs
    pub const ALL: [Surface; 2] = [Surface::Top, Surface::Bottom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Top => "top",
            Surface::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a prefetch key points at; also selects the de-duplication bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchKind {
    Tile,
    Defect,
}

impl fmt::Display for PrefetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefetchKind::Tile => f.write_str("tile"),
            PrefetchKind::Defect => f.write_str("defect"),
        }
    }
}

/// Bookkeeping attached to every enqueued image request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchMeta {
    pub seq_no: u64,
    pub kind: PrefetchKind,
    pub surface: Option<Surface>,
    pub level: Option<u32>,
}

impl PrefetchMeta {
    pub fn tile(seq_no: u64, surface: Surface, level: u32) -> Self {
        Self {
            seq_no,
            kind: PrefetchKind::Tile,
            surface: Some(surface),
            level: Some(level),
        }
    }

    pub fn defect(seq_no: u64, surface: Option<Surface>) -> Self {
        Self {
            seq_no,
            kind: PrefetchKind::Defect,
            surface,
            level: None,
        }
    }
}

/// Address of a single tile image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest<'a> {
    pub surface: Surface,
    pub seq_no: u64,
    pub level: u32,
    pub tile_x: u64,
    pub tile_y: u64,
    pub tile_size: u32,
    pub view: &'a str,
}

// =========================
// Backend wire types
// =========================

/// `GET /api/meta`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingInfo {
    pub tile: TileDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDefaults {
    pub default_tile_size: u32,
    pub max_level: u32,
}

/// `GET /api/steels/{seq_no}/meta`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default)]
    pub surface_images: Vec<SurfaceImage>,
}

impl RecordMeta {
    pub fn surface(&self, surface: Surface) -> Option<&SurfaceImage> {
        self.surface_images.iter().find(|s| s.surface == surface)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceImage {
    pub surface: Surface,
    pub image_width: u64,
    /// Height of a single frame
    pub image_height: u64,
    pub frame_count: u64,
}

impl SurfaceImage {
    /// Full stitched size as `(width, height)`; frames stack vertically
    pub fn mosaic_size(&self) -> (u64, u64) {
        (
            self.image_width,
            self.image_height.saturating_mul(self.frame_count),
        )
    }
}

/// One entry of `GET /api/defects/{seq_no}`; extra fields are ignored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefectInfo {
    pub id: serde_json::Value,
    #[serde(default)]
    pub surface: Option<Surface>,
}

impl DefectInfo {
    /// Defect ids arrive as numbers or strings depending on the backend build
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// `GET /api/cache/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStatus {
    #[serde(default)]
    pub current_seq_no: Option<u64>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub cached_records: Option<u64>,
}

/// One entry of `GET /api/cache/records`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub seq_no: u64,
    #[serde(default)]
    pub cached: bool,
}

/// `GET /api/cache/settings`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub tile_limit: Option<usize>,
    #[serde(default)]
    pub defect_limit: Option<usize>,
    #[serde(default)]
    pub prefetch_enabled: Option<bool>,
}
