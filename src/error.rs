// Error taxonomy shared by the catalog, upload and playback layers.

use std::time::Duration;

use thiserror::Error;

use crate::engine::traits::SurfaceId;

/// Failures of a single catalog HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request could not complete (connect, reset, body read).
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response, or a 2xx envelope with `success: false`.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("video not found: {0}")]
    NotFound(String),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    /// The request could not be built locally; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

/// Local, pre-network rejection of an upload candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("unsupported file type {found}, expected {expected}")]
    WrongType { found: String, expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("an upload is already in progress")]
    Busy,
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
}

impl From<ClientError> for UploadError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Server { message, .. } => UploadError::Rejected(message),
            ClientError::NotFound(what) => UploadError::Rejected(format!("not found: {}", what)),
            ClientError::InvalidRequest(msg) => UploadError::Rejected(msg),
            ClientError::Network(msg) | ClientError::InvalidBaseUrl(msg) => {
                UploadError::Network(msg)
            }
        }
    }
}

/// Streaming engine failures. Absorbed by the playback controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineLoadError {
    #[error("engine load failed: {0}")]
    Load(String),
    #[error("session creation failed: {0}")]
    CreateSession(String),
    #[error("surface {0:?} already has a live engine handle")]
    SurfaceBusy(SurfaceId),
    #[error("display surface is gone")]
    SurfaceGone,
    #[error("invalid manifest url: {0}")]
    InvalidManifestUrl(String),
    #[error("engine load timed out after {0:?}")]
    TimedOut(Duration),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("engine binding already released")]
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_becomes_rejection() {
        let err = UploadError::from(ClientError::Server {
            status: 409,
            message: "Video ID already exists".to_string(),
        });
        assert_eq!(err, UploadError::Rejected("Video ID already exists".to_string()));
    }

    #[test]
    fn test_unbuildable_request_is_a_rejection() {
        let err = UploadError::from(ClientError::InvalidRequest("bad mime".to_string()));
        assert_eq!(err, UploadError::Rejected("bad mime".to_string()));
    }

    #[test]
    fn test_network_error_stays_network() {
        let err = UploadError::from(ClientError::Network("connection reset".to_string()));
        assert!(matches!(err, UploadError::Network(_)));
    }
}
