// Upload session: validates a candidate locally, then submits it at most one at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::model::UploadReceipt;
use crate::catalog::traits::CatalogApi;
use crate::config::{ACCEPTED_VIDEO_MIME, MAX_UPLOAD_BYTES, SNIFF_BYTES};
use crate::detect::container::{detect_container, essence};
use crate::error::{UploadError, ValidationError};

/// A file picked for upload. Lives for one attempt only.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub file_name: String,
    pub data: Bytes,
    pub declared_size: u64,
    pub declared_mime: String,
}

impl UploadCandidate {
    /// Candidate whose declared size is the actual byte length.
    pub fn new(file_name: impl Into<String>, declared_mime: impl Into<String>, data: Bytes) -> Self {
        let declared_size = data.len() as u64;
        Self {
            file_name: file_name.into(),
            data,
            declared_size,
            declared_mime: declared_mime.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub accepted_mime: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            accepted_mime: ACCEPTED_VIDEO_MIME.to_string(),
        }
    }
}

impl UploadPolicy {
    /// Pure client-side guard. Never touches the network.
    pub fn validate(&self, candidate: &UploadCandidate) -> Result<(), ValidationError> {
        if candidate.declared_size > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: candidate.declared_size,
                limit: self.max_bytes,
            });
        }

        let expected = essence(&self.accepted_mime);
        let declared = essence(&candidate.declared_mime);
        if declared != expected {
            return Err(ValidationError::WrongType {
                found: candidate.declared_mime.clone(),
                expected,
            });
        }

        // Content we can positively identify as another container is refused.
        let head = &candidate.data[..candidate.data.len().min(SNIFF_BYTES)];
        if let Some(mime) = detect_container(head).mime() {
            if mime != expected {
                return Err(ValidationError::WrongType {
                    found: mime.to_string(),
                    expected,
                });
            }
        }
        Ok(())
    }
}

/// Progress and outcome of the session's latest attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading { file_name: String, bytes: u64 },
    Succeeded { video_id: Option<String> },
    Failed { reason: String },
}

/// Clears the in-flight flag however the submission ends.
struct Pending<'a>(&'a AtomicBool);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UploadSession {
    catalog: Arc<dyn CatalogApi>,
    policy: UploadPolicy,
    in_flight: AtomicBool,
    status: watch::Sender<UploadStatus>,
}

impl UploadSession {
    pub fn new(catalog: Arc<dyn CatalogApi>, policy: UploadPolicy) -> Self {
        let (status, _) = watch::channel(UploadStatus::Idle);
        Self {
            catalog,
            policy,
            in_flight: AtomicBool::new(false),
            status,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> Result<(), ValidationError> {
        self.policy.validate(candidate)
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn status(&self) -> UploadStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    /// Validate and send `candidate`. The caller re-lists the catalog on success.
    pub async fn submit(&self, candidate: UploadCandidate) -> Result<UploadReceipt, UploadError> {
        if let Err(e) = self.validate(&candidate) {
            debug!("upload {} rejected locally: {}", candidate.file_name, e);
            // The status belongs to the pending upload while one is running.
            if !self.is_uploading() {
                self.status.send_replace(UploadStatus::Failed {
                    reason: e.to_string(),
                });
            }
            return Err(e.into());
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("upload {} refused, another upload is pending", candidate.file_name);
            return Err(UploadError::Busy);
        }
        let _pending = Pending(&self.in_flight);

        self.status.send_replace(UploadStatus::Uploading {
            file_name: candidate.file_name.clone(),
            bytes: candidate.declared_size,
        });

        match self.catalog.upload(&candidate).await {
            Ok(receipt) => {
                info!("upload {} accepted as {:?}", candidate.file_name, receipt.video_id);
                self.status.send_replace(UploadStatus::Succeeded {
                    video_id: receipt.video_id.clone(),
                });
                Ok(receipt)
            }
            Err(e) => {
                let err = UploadError::from(e);
                warn!("upload {} failed: {}", candidate.file_name, err);
                self.status.send_replace(UploadStatus::Failed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }
}
