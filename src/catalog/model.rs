use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::{MANIFEST_FILE, THUMBNAIL_FILE};

/// A listed video. `id` doubles as the title and the routing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: String,
}

/// The full list as the server ordered it. Only ever replaced, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    videos: Vec<VideoRecord>,
}

impl CatalogSnapshot {
    pub fn new(videos: Vec<VideoRecord>) -> Self {
        Self { videos }
    }

    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&VideoRecord> {
        self.videos.iter().find(|v| v.id == id)
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReceipt {
    /// Id the server assigned, when it reported one.
    pub video_id: Option<String>,
}

/// `{ success, data?, error? }` wrapper used by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadData {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

/// Builds every URL the client touches from one validated base.
#[derive(Debug, Clone)]
pub struct ContentUrls {
    base: Url,
}

impl ContentUrls {
    /// `base` must not be a cannot-be-a-base URL; `ClientConfig::base_url` checks this.
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Append percent-encoded path segments to the base.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Site-relative page route, e.g. `/videos/{id}`, each segment percent-encoded.
    pub fn route(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments);
        }
        url.path().to_string()
    }

    pub fn videos(&self) -> Url {
        self.endpoint(&["api", "videos"])
    }

    pub fn video(&self, id: &str) -> Url {
        self.endpoint(&["api", "videos", id])
    }

    pub fn upload(&self) -> Url {
        self.endpoint(&["api", "upload"])
    }

    pub fn delete(&self, id: &str) -> Url {
        self.endpoint(&["api", "delete", id])
    }

    pub fn manifest(&self, id: &str) -> Url {
        self.endpoint(&["api", "content", id, MANIFEST_FILE])
    }

    pub fn thumbnail(&self, id: &str) -> Url {
        self.endpoint(&["api", "content", id, THUMBNAIL_FILE])
    }
}
