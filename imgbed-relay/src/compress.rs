//! Compressor seam between the relay and the compression service

use async_trait::async_trait;
use hyper::body::Bytes;
use thiserror::Error;

/// Compressed image ready to be sent back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub data: Bytes,
    pub content_type: String,
    /// Size reported by the service
    pub size: u64,
}

#[derive(Error, Debug)]
pub enum CompressError {
    /// The service rejected the request; status and body are forwarded as-is
    #[error("TinyPNG API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// Anything else: network failures, malformed responses
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for CompressError {
    fn from(err: reqwest::Error) -> Self {
        CompressError::Other(err.to_string())
    }
}

/// Something that can shrink an image
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, data: Bytes) -> Result<CompressedImage, CompressError>;
}
