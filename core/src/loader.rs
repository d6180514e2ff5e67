/// Image Loader
///
/// Issues exactly one fetch per prefetch key, decodes the image header to read
/// its pixel size and reports the wall-clock latency. Failures are reported as
/// `LoadResult::Failed` and never retried.
use crate::config::BackendConfig;
use crate::{Result, SteelSightError};
use async_trait::async_trait;
use std::io::Cursor;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of a single image load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Loaded {
        elapsed_ms: f64,
        width: u32,
        height: u32,
    },
    Failed,
}

impl LoadResult {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadResult::Loaded { .. })
    }
}

/// Fetches and decodes one image resource
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> LoadResult;
}

/// reqwest-backed loader
pub struct HttpImageLoader {
    http_client: reqwest::Client,
}

impl HttpImageLoader {
    /// Image loads carry no deadline unless `image_timeout_ms` is set
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(ms) = config.image_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let http_client = builder
            .build()
            .map_err(|e| SteelSightError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    async fn fetch(&self, url: &str) -> Result<(u32, u32)> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SteelSightError::Backend(format!(
                "image request returned status: {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        image_dimensions(&bytes)
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> LoadResult {
        let started = Instant::now();
        match self.fetch(url).await {
            Ok((width, height)) => LoadResult::Loaded {
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
                width,
                height,
            },
            Err(e) => {
                debug!(target: "prefetch.loader", url = %url, error = %e, "Image load failed");
                LoadResult::Failed
            }
        }
    }
}

/// Read pixel dimensions from an encoded image without decoding pixel data
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| SteelSightError::Decode(e.to_string()))
}
