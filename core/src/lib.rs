// SteelSight Core Library
// Client-side tile / defect-crop prefetch cache for the cache diagnostics view

pub mod backend;
pub mod config;
pub mod driver;
pub mod event_log;
pub mod ledger;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod stats;
pub mod store;

#[cfg(test)]
mod test_server;

// Export core types
pub use backend::{CacheBackend, HttpBackend};
pub use config::{BackendConfig, PrefetchConfig};
pub use driver::{DriverInput, PrefetchDriver};
pub use loader::{HttpImageLoader, ImageLoader, LoadResult};
pub use model::{PrefetchKind, PrefetchMeta, Surface};
pub use orchestrator::{
    OrchestratorState, PrefetchContext, PrefetchOrchestrator, RunOutcome, RunReport, SkipReason,
};
pub use store::{CacheDebugSnapshot, PrefetchCacheStore};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SteelSightError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SteelSightError>;
