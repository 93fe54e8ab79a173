use bytes::Bytes;
use reqwest::Url;

use crate::catalog::model::{CatalogSnapshot, ContentUrls, VideoRecord};

/// One tile of the catalog grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCard {
    pub id: String,
    pub uploaded_at: String,
    /// Route of the detail page.
    pub href: String,
    pub thumbnail_url: Url,
}

impl VideoCard {
    pub fn from_record(record: &VideoRecord, urls: &ContentUrls) -> Self {
        Self {
            id: record.id.clone(),
            uploaded_at: record.uploaded_at.clone(),
            href: urls.route(&["videos", &record.id]),
            thumbnail_url: urls.thumbnail(&record.id),
        }
    }
}

/// What the catalog area shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Loading,
    /// "No videos uploaded yet" placeholder.
    Empty,
    Videos(Vec<VideoCard>),
    Failed(String),
}

impl Listing {
    pub fn from_snapshot(snapshot: &CatalogSnapshot, urls: &ContentUrls) -> Self {
        if snapshot.is_empty() {
            return Listing::Empty;
        }
        Listing::Videos(
            snapshot
                .videos()
                .iter()
                .map(|r| VideoCard::from_record(r, urls))
                .collect(),
        )
    }
}

/// A thumbnail that failed to load degrades to a placeholder glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Image(Bytes),
    Placeholder,
}
