use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::model::{CatalogSnapshot, ContentUrls, Envelope, UploadData, UploadReceipt, VideoRecord};
use super::traits::CatalogApi;
use crate::error::ClientError;
use crate::upload::UploadCandidate;

pub struct HttpCatalog {
    client: Client,
    urls: ContentUrls,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when the request finishes, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl HttpCatalog {
    pub fn new(urls: ContentUrls) -> Self {
        Self::with_client(Client::new(), urls)
    }

    pub fn with_client(client: Client, urls: ContentUrls) -> Self {
        Self {
            client,
            urls,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn urls(&self) -> &ContentUrls {
        &self.urls
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    fn track(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight(&self.in_flight)
    }
}

/// Read a JSON envelope, mapping HTTP and envelope failures to `ClientError`.
///
/// Returns the envelope's `data`, which may legitimately be absent.
async fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, ClientError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    let parsed = serde_json::from_slice::<Envelope<T>>(&body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|env| env.error)
            .unwrap_or_else(|| reason(status));
        warn!("catalog request failed status={} message={}", status.as_u16(), message);
        return Err(ClientError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let envelope = parsed.map_err(|e| ClientError::Server {
        status: status.as_u16(),
        message: format!("malformed response: {}", e),
    })?;
    if !envelope.success {
        return Err(ClientError::Server {
            status: status.as_u16(),
            message: envelope.error.unwrap_or_else(|| "request unsuccessful".to_string()),
        });
    }
    Ok(envelope.data)
}

/// Like `read_envelope`, but a 2xx without a parseable envelope still counts as success.
async fn read_ack<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        return read_envelope(resp).await;
    }
    let body = resp.bytes().await?;
    match serde_json::from_slice::<Envelope<T>>(&body) {
        Ok(env) if !env.success => Err(ClientError::Server {
            status: status.as_u16(),
            message: env.error.unwrap_or_else(|| "request unsuccessful".to_string()),
        }),
        Ok(env) => Ok(env.data),
        Err(_) => Ok(None),
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[async_trait]
impl CatalogApi for HttpCatalog {
    async fn list(&self) -> Result<CatalogSnapshot, ClientError> {
        let _guard = self.track();
        let resp = self.client.get(self.urls.videos()).send().await?;
        let videos: Option<Vec<VideoRecord>> = read_envelope(resp).await?;
        let snapshot = CatalogSnapshot::new(videos.unwrap_or_default());
        debug!("catalog listed {} videos", snapshot.len());
        Ok(snapshot)
    }

    async fn get(&self, id: &str) -> Result<VideoRecord, ClientError> {
        let _guard = self.track();
        let resp = self.client.get(self.urls.video(id)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("video {} not found", id);
            return Err(ClientError::NotFound(id.to_string()));
        }
        read_envelope::<VideoRecord>(resp)
            .await?
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn remove(&self, id: &str) -> Result<(), ClientError> {
        let _guard = self.track();
        let resp = self.client.delete(self.urls.delete(id)).send().await?;
        read_ack::<serde_json::Value>(resp).await?;
        info!("video {} deleted", id);
        Ok(())
    }

    async fn upload(&self, candidate: &UploadCandidate) -> Result<UploadReceipt, ClientError> {
        let part = Part::stream_with_length(candidate.data.clone(), candidate.data.len() as u64)
            .file_name(candidate.file_name.clone())
            .mime_str(&candidate.declared_mime)
            .map_err(|e| {
                ClientError::InvalidRequest(format!(
                    "content type {:?}: {}",
                    candidate.declared_mime, e
                ))
            })?;
        let form = Form::new().part("file", part);

        let _guard = self.track();
        let resp = self
            .client
            .post(self.urls.upload())
            .multipart(form)
            .send()
            .await?;
        let data: Option<UploadData> = read_ack(resp).await?;
        let receipt = UploadReceipt {
            video_id: data.map(|d| d.video_id),
        };
        info!(
            "uploaded {} ({} bytes) as {:?}",
            candidate.file_name,
            candidate.data.len(),
            receipt.video_id
        );
        Ok(receipt)
    }

    async fn thumbnail(&self, id: &str) -> Result<Bytes, ClientError> {
        let _guard = self.track();
        let resp = self.client.get(self.urls.thumbnail(id)).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: reason(status),
            });
        }
        Ok(resp.bytes().await?)
    }
}
