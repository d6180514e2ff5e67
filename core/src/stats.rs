use serde::{Deserialize, Serialize};

/// Running totals over every successfully loaded prefetch image
#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
    image_count: u64,
    total_load_ms: f64,
    total_width: u64,
    total_height: u64,
}

/// Averages derived from [`AggregateStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub image_count: u64,
    pub avg_load_ms: f64,
    pub avg_width: f64,
    pub avg_height: f64,
}

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, elapsed_ms: f64, width: u32, height: u32) {
        self.image_count += 1;
        self.total_load_ms += elapsed_ms;
        self.total_width += u64::from(width);
        self.total_height += u64::from(height);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        if self.image_count == 0 {
            return StatsSnapshot::default();
        }
        let n = self.image_count as f64;
        StatsSnapshot {
            image_count: self.image_count,
            avg_load_ms: self.total_load_ms / n,
            avg_width: self.total_width as f64 / n,
            avg_height: self.total_height as f64 / n,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
