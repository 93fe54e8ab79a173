use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::ClientError;
use crate::upload::UploadPolicy;

/// Largest upload accepted client-side (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// The only MIME type the upload endpoint accepts.
pub const ACCEPTED_VIDEO_MIME: &str = "video/mp4";

/// Manifest file name under `/api/content/{id}/`.
pub const MANIFEST_FILE: &str = "manifest.mpd";

/// Thumbnail file name under `/api/content/{id}/`.
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// Bytes of an upload inspected for container sniffing.
pub const SNIFF_BYTES: usize = 512;

/// Default bound on engine load plus session creation, in seconds.
pub const DEFAULT_ENGINE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration for the video client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin of the catalog API, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Upload size ceiling in bytes.
    pub max_upload_bytes: u64,
    /// Accepted upload MIME type.
    pub accepted_mime: String,
    /// Bound on engine load and session creation. `None` waits forever.
    pub engine_load_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            accepted_mime: ACCEPTED_VIDEO_MIME.to_string(),
            engine_load_timeout_secs: Some(DEFAULT_ENGINE_LOAD_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parse and check the base URL. It must be able to carry path segments.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {}", self.base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(url)
    }

    pub fn engine_load_timeout(&self) -> Option<Duration> {
        self.engine_load_timeout_secs.map(Duration::from_secs)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_upload_bytes,
            accepted_mime: self.accepted_mime.clone(),
        }
    }
}
