// Per-record cache ledger
//
// Counts completed prefetches per plate record: tiles by surface and zoom
// level, defect crops as a flat total.

use crate::model::{PrefetchKind, Surface};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Cached image counts for one plate record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchRecord {
    /// surface -> level -> tile count
    pub tiles: BTreeMap<Surface, BTreeMap<u32, u64>>,
    pub defect_count: u64,
}

impl PrefetchRecord {
    pub fn tile_count(&self) -> u64 {
        self.tiles.values().flat_map(|levels| levels.values()).sum()
    }

    pub fn tiles_at(&self, surface: Surface, level: u32) -> u64 {
        self.tiles
            .get(&surface)
            .and_then(|levels| levels.get(&level))
            .copied()
            .unwrap_or(0)
    }
}

/// Flattened row for the ledger table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub seq_no: u64,
    pub tile_count: u64,
    pub defect_count: u64,
}

#[derive(Debug, Default)]
pub struct CacheLedger {
    records: BTreeMap<u64, PrefetchRecord>,
}

impl CacheLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed prefetch against `seq_no`
    pub fn record(
        &mut self,
        seq_no: u64,
        kind: PrefetchKind,
        surface: Option<Surface>,
        level: Option<u32>,
    ) {
        match kind {
            PrefetchKind::Tile => {
                let (Some(surface), Some(level)) = (surface, level) else {
                    warn!(target: "prefetch.ledger", seq_no, "Tile completion without surface/level; ignored");
                    return;
                };
                *self
                    .records
                    .entry(seq_no)
                    .or_default()
                    .tiles
                    .entry(surface)
                    .or_default()
                    .entry(level)
                    .or_insert(0) += 1;
            }
            PrefetchKind::Defect => {
                self.records.entry(seq_no).or_default().defect_count += 1;
            }
        }
    }

    pub fn get(&self, seq_no: u64) -> Option<&PrefetchRecord> {
        self.records.get(&seq_no)
    }

    /// Rows sorted by descending sequence number
    pub fn summary(&self) -> Vec<LedgerSummary> {
        self.records
            .iter()
            .rev()
            .map(|(seq_no, rec)| LedgerSummary {
                seq_no: *seq_no,
                tile_count: rec.tile_count(),
                defect_count: rec.defect_count,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
