/// Backend client
///
/// Read-only access to the defect-detection backend: tiling metadata,
/// per-record surface metadata, defect lists and the server-side cache
/// endpoints, plus the URL scheme for tile and defect-crop images.
use crate::config::BackendConfig;
use crate::model::{
    CacheRecord, CacheSettings, CacheStatus, DefectInfo, RecordMeta, Surface, TileRequest,
    TilingInfo,
};
use crate::{Result, SteelSightError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Global tile size and zoom depth
    async fn tiling_info(&self) -> Result<TilingInfo>;

    /// Surface image geometry of one record
    async fn record_meta(&self, seq_no: u64) -> Result<RecordMeta>;

    /// Defects of one record in backend order
    async fn defects(&self, seq_no: u64) -> Result<Vec<DefectInfo>>;

    async fn cache_status(&self) -> Result<CacheStatus>;

    async fn cache_records(&self, limit: usize) -> Result<Vec<CacheRecord>>;

    async fn cache_settings(&self) -> Result<CacheSettings>;

    fn tile_url(&self, req: &TileRequest<'_>) -> String;

    fn defect_url(&self, defect_id: &str, surface: Option<Surface>) -> String;
}

/// reqwest implementation of [`CacheBackend`]
#[derive(Clone)]
pub struct HttpBackend {
    config: BackendConfig,
    http_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SteelSightError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(BackendConfig::default())
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base(), path);
        debug!(target: "prefetch.backend", url = %url, "GET");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!(target: "prefetch.backend", url = %url, error = %e, "Backend request failed");
            SteelSightError::Backend(format!("request to {path} failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            debug!(target: "prefetch.backend", url = %url, status = %status, "Backend returned error");
            return Err(SteelSightError::Backend(format!(
                "{path} returned status: {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            SteelSightError::Backend(format!("failed to parse {path} response: {e}"))
        })
    }
}

#[async_trait]
impl CacheBackend for HttpBackend {
    async fn tiling_info(&self) -> Result<TilingInfo> {
        self.get_json("/api/meta").await
    }

    async fn record_meta(&self, seq_no: u64) -> Result<RecordMeta> {
        self.get_json(&format!("/api/steels/{seq_no}/meta")).await
    }

    async fn defects(&self, seq_no: u64) -> Result<Vec<DefectInfo>> {
        self.get_json(&format!("/api/defects/{seq_no}")).await
    }

    async fn cache_status(&self) -> Result<CacheStatus> {
        self.get_json("/api/cache/status").await
    }

    async fn cache_records(&self, limit: usize) -> Result<Vec<CacheRecord>> {
        self.get_json(&format!("/api/cache/records?limit={limit}"))
            .await
    }

    async fn cache_settings(&self) -> Result<CacheSettings> {
        self.get_json("/api/cache/settings").await
    }

    fn tile_url(&self, req: &TileRequest<'_>) -> String {
        build_tile_url(self.base(), req)
    }

    fn defect_url(&self, defect_id: &str, surface: Option<Surface>) -> String {
        build_defect_url(self.base(), defect_id, surface)
    }
}

pub fn build_tile_url(base: &str, req: &TileRequest<'_>) -> String {
    format!(
        "{}/api/images/tile?surface={}&seq_no={}&level={}&tile_x={}&tile_y={}&tile_size={}&view={}",
        base,
        req.surface,
        req.seq_no,
        req.level,
        req.tile_x,
        req.tile_y,
        req.tile_size,
        urlencoding::encode(req.view)
    )
}

pub fn build_defect_url(base: &str, defect_id: &str, surface: Option<Surface>) -> String {
    let mut url = format!(
        "{}/api/images/defect/{}",
        base,
        urlencoding::encode(defect_id)
    );
    if let Some(surface) = surface {
        url.push_str("?surface=");
        url.push_str(surface.as_str());
    }
    url
}
