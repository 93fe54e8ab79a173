use async_trait::async_trait;
use bytes::Bytes;

use super::model::{CatalogSnapshot, UploadReceipt, VideoRecord};
use crate::error::ClientError;
use crate::upload::UploadCandidate;

/// One request, one response. Implementations never retry and never cache.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list(&self) -> Result<CatalogSnapshot, ClientError>;
    async fn get(&self, id: &str) -> Result<VideoRecord, ClientError>;
    async fn remove(&self, id: &str) -> Result<(), ClientError>;
    async fn upload(&self, candidate: &UploadCandidate) -> Result<UploadReceipt, ClientError>;
    async fn thumbnail(&self, id: &str) -> Result<Bytes, ClientError>;
}
