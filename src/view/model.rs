// Catalog view model: the list, the open video, and their reconciliation after mutations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::listing::{Listing, Thumbnail};
use crate::catalog::model::{CatalogSnapshot, ContentUrls, UploadReceipt, VideoRecord};
use crate::catalog::traits::CatalogApi;
use crate::engine::controller::PlaybackController;
use crate::error::{ClientError, UploadError};
use crate::upload::{UploadCandidate, UploadPolicy, UploadSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatus {
    Loading,
    Ready(CatalogSnapshot),
    /// No snapshot was ever loaded.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailStatus {
    None,
    Loading,
    Found(VideoRecord),
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub catalog: CatalogStatus,
    pub selected: Option<String>,
    pub detail: DetailStatus,
    /// Most recent failure, for a dismissible message.
    pub last_error: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            catalog: CatalogStatus::Loading,
            selected: None,
            detail: DetailStatus::None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// The deleted video was open, so the detail view was left.
    pub navigated_away: bool,
}

pub struct CatalogViewModel {
    catalog: Arc<dyn CatalogApi>,
    uploads: UploadSession,
    player: Option<PlaybackController>,
    urls: ContentUrls,
    refresh_seq: AtomicU64,
    state: watch::Sender<ViewState>,
}

impl CatalogViewModel {
    pub fn new(catalog: Arc<dyn CatalogApi>, policy: UploadPolicy, urls: ContentUrls) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            uploads: UploadSession::new(Arc::clone(&catalog), policy),
            catalog,
            player: None,
            urls,
            refresh_seq: AtomicU64::new(0),
            state,
        }
    }

    /// Attach the controller that `open`/`close` drive.
    pub fn with_player(mut self, player: PlaybackController) -> Self {
        self.player = Some(player);
        self
    }

    pub fn player(&self) -> Option<&PlaybackController> {
        self.player.as_ref()
    }

    pub fn uploads(&self) -> &UploadSession {
        &self.uploads
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn selected(&self) -> Option<String> {
        self.state.borrow().selected.clone()
    }

    pub fn snapshot(&self) -> Option<CatalogSnapshot> {
        match &self.state.borrow().catalog {
            CatalogStatus::Ready(snapshot) => Some(snapshot.clone()),
            _ => None,
        }
    }

    pub fn listing(&self) -> Listing {
        match &self.state.borrow().catalog {
            CatalogStatus::Loading => Listing::Loading,
            CatalogStatus::Ready(snapshot) => Listing::from_snapshot(snapshot, &self.urls),
            CatalogStatus::Failed(message) => Listing::Failed(message.clone()),
        }
    }

    /// Re-list and swap the snapshot in whole. A refresh overtaken by a newer one is dropped.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let seq = self.refresh_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let result = self.catalog.list().await;
        if self.refresh_seq.load(Ordering::Acquire) != seq {
            debug!("refresh {} superseded, result dropped", seq);
            return result.map(|_| ());
        }

        match result {
            Ok(snapshot) => {
                debug!("refresh {} applied, {} videos", seq, snapshot.len());
                self.state.send_modify(|s| {
                    s.catalog = CatalogStatus::Ready(snapshot);
                    s.last_error = None;
                });
                Ok(())
            }
            Err(e) => {
                warn!("refresh {} failed: {}", seq, e);
                let message = e.to_string();
                self.state.send_modify(|s| {
                    if !matches!(s.catalog, CatalogStatus::Ready(_)) {
                        s.catalog = CatalogStatus::Failed(message.clone());
                    }
                    s.last_error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Select `id`, start its playback and load its record.
    pub async fn open(&self, id: &str) -> Result<VideoRecord, ClientError> {
        self.state.send_modify(|s| {
            s.selected = Some(id.to_string());
            s.detail = DetailStatus::Loading;
        });
        if let Some(player) = &self.player {
            player.open(id);
        }

        let result = self.catalog.get(id).await;
        let current = self.state.send_if_modified(|s| {
            if s.selected.as_deref() != Some(id) {
                return false;
            }
            s.detail = match &result {
                Ok(record) => DetailStatus::Found(record.clone()),
                Err(ClientError::NotFound(_)) => DetailStatus::NotFound,
                Err(e) => DetailStatus::Failed(e.to_string()),
            };
            true
        });

        if !current {
            debug!("detail for {} arrived after selection changed", id);
        } else if let Err(ClientError::NotFound(_)) = &result {
            info!("video {} does not exist, closing player", id);
            if let Some(player) = &self.player {
                player.close();
            }
        }
        result
    }

    pub fn close(&self) {
        self.state.send_modify(|s| {
            s.selected = None;
            s.detail = DetailStatus::None;
        });
        if let Some(player) = &self.player {
            player.close();
        }
    }

    /// Delete on the server, then re-list. Leaves the detail view if it showed `id`.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, ClientError> {
        if let Err(e) = self.catalog.remove(id).await {
            warn!("delete of {} failed: {}", id, e);
            self.state.send_modify(|s| s.last_error = Some(e.to_string()));
            return Err(e);
        }

        let navigated_away = self.selected().as_deref() == Some(id);
        if navigated_away {
            self.close();
        }
        if let Err(e) = self.refresh().await {
            debug!("refresh after deleting {} failed: {}", id, e);
        }
        Ok(DeleteOutcome { navigated_away })
    }

    /// Submit through the upload session, then re-list.
    pub async fn upload(&self, candidate: UploadCandidate) -> Result<UploadReceipt, UploadError> {
        let receipt = self.uploads.submit(candidate).await?;
        if let Err(e) = self.refresh().await {
            debug!("refresh after upload failed: {}", e);
        }
        Ok(receipt)
    }

    /// Best-effort thumbnail. Any failure yields the placeholder.
    pub async fn thumbnail(&self, id: &str) -> Thumbnail {
        match self.catalog.thumbnail(id).await {
            Ok(bytes) if !bytes.is_empty() => Thumbnail::Image(bytes),
            Ok(_) => Thumbnail::Placeholder,
            Err(e) => {
                debug!("thumbnail for {} unavailable: {}", id, e);
                Thumbnail::Placeholder
            }
        }
    }
}
