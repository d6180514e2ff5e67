// Configuration for the backend client and the prefetch orchestrator.
//
// Defaults come from environment variables and fall back to constants.

use crate::event_log::DEFAULT_LOG_CAPACITY;
use crate::model::CacheSettings;
use serde::{Deserialize, Serialize};

/// HTTP client configuration for the defect-detection backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String, // e.g., http://localhost:8120
    /// Deadline for metadata calls
    pub request_timeout_ms: u64,
    /// Deadline for image loads; `None` leaves failure signalling to the transport
    pub image_timeout_ms: Option<u64>,
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("STEELSIGHT_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:8120".to_string()),
            request_timeout_ms: std::env::var("STEELSIGHT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000),
            image_timeout_ms: std::env::var("STEELSIGHT_IMAGE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0),
            user_agent: "steelsight-prefetch/0.1".to_string(),
        }
    }
}

/// Prefetch policy of the cache diagnostics view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    pub enabled: bool,
    pub tile_limit: usize,
    pub defect_limit: usize,
    /// View name passed through to tile URLs
    pub view: String,
    pub log_capacity: usize,
    /// How many cache records to ask for when resolving visible records
    pub record_limit: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: std::env::var("STEELSIGHT_PREFETCH")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(true),
            tile_limit: std::env::var("STEELSIGHT_TILE_LIMIT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(64),
            defect_limit: std::env::var("STEELSIGHT_DEFECT_LIMIT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(32),
            view: std::env::var("STEELSIGHT_VIEW")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "2D".to_string()),
            log_capacity: std::env::var("STEELSIGHT_LOG_CAPACITY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_LOG_CAPACITY),
            record_limit: 20,
        }
    }
}

impl PrefetchConfig {
    /// Overlay limits reported by the backend's cache settings endpoint
    pub fn apply_settings(&mut self, settings: &CacheSettings) {
        if let Some(v) = settings.tile_limit {
            self.tile_limit = v;
        }
        if let Some(v) = settings.defect_limit {
            self.defect_limit = v;
        }
        if let Some(v) = settings.prefetch_enabled {
            self.enabled = v;
        }
    }
}
