use std::fs;
use std::path::Path;

use steelsight_core::{BackendConfig, PrefetchConfig};

/// High-level configuration for the cache probe
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub backend: BackendConfig,
    pub prefetch: PrefetchConfig,
    /// Production line key reported with the snapshot
    pub line: String,
    /// Upper bound on how long to wait for in-flight loads
    pub drain_timeout_ms: u64,
    /// Ask the backend for its cache settings and overlay the limits
    pub use_server_settings: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        // Core defaults already consider env vars
        Self {
            backend: BackendConfig::default(),
            prefetch: PrefetchConfig::default(),
            line: std::env::var("STEELSIGHT_LINE").unwrap_or_else(|_| "default".to_string()),
            drain_timeout_ms: 30_000,
            use_server_settings: true,
        }
    }
}

impl ProbeConfig {
    /// Load configuration from a TOML file (path via CACHE_PROBE_CONFIG or ./cache_probe.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("CACHE_PROBE_CONFIG").unwrap_or_else(|_| "cache_probe.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "cache_probe", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s, default),
            Err(e) => {
                tracing::warn!(target = "cache_probe", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    fn from_toml_str(s: &str, default: Self) -> Self {
        match toml::from_str::<ProbeToml>(s) {
            Ok(t) => t.overlay(default),
            Err(e) => {
                tracing::warn!(target = "cache_probe", error = %e, "Failed to parse TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ProbeToml {
    pub line: Option<String>,
    pub drain_timeout_ms: Option<u64>,
    pub use_server_settings: Option<bool>,
    pub backend: Option<BackendToml>,
    pub prefetch: Option<PrefetchToml>,
}

impl ProbeToml {
    fn overlay(self, mut base: ProbeConfig) -> ProbeConfig {
        if let Some(v) = self.line {
            base.line = v;
        }
        if let Some(v) = self.drain_timeout_ms {
            base.drain_timeout_ms = v;
        }
        if let Some(v) = self.use_server_settings {
            base.use_server_settings = v;
        }
        if let Some(b) = self.backend {
            b.apply(&mut base.backend);
        }
        if let Some(p) = self.prefetch {
            p.apply(&mut base.prefetch);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct BackendToml {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub image_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}
impl BackendToml {
    fn apply(self, b: &mut BackendConfig) {
        if let Some(x) = self.base_url {
            b.base_url = x;
        }
        if let Some(x) = self.request_timeout_ms {
            b.request_timeout_ms = x;
        }
        if let Some(x) = self.image_timeout_ms {
            b.image_timeout_ms = Some(x).filter(|v| *v > 0);
        }
        if let Some(x) = self.user_agent {
            b.user_agent = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct PrefetchToml {
    pub enabled: Option<bool>,
    pub tile_limit: Option<usize>,
    pub defect_limit: Option<usize>,
    pub view: Option<String>,
    pub log_capacity: Option<usize>,
    pub record_limit: Option<usize>,
}
impl PrefetchToml {
    fn apply(self, p: &mut PrefetchConfig) {
        if let Some(x) = self.enabled {
            p.enabled = x;
        }
        if let Some(x) = self.tile_limit {
            p.tile_limit = x;
        }
        if let Some(x) = self.defect_limit {
            p.defect_limit = x;
        }
        if let Some(x) = self.view {
            p.view = x;
        }
        if let Some(x) = self.log_capacity {
            p.log_capacity = x.max(1);
        }
        if let Some(x) = self.record_limit {
            p.record_limit = x;
        }
    }
}
