//! Tinify (TinyPNG) API client

use async_trait::async_trait;
use hyper::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::compress::{CompressError, CompressedImage, Compressor};

const TINIFY_API_BASE: &str = "https://api.tinify.com";

/// Client for the Tinify shrink endpoint
pub struct TinifyClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ShrinkResponse {
    output: ShrinkOutput,
}

/// Result description returned by `/shrink`
#[derive(Debug, Clone, Deserialize)]
pub struct ShrinkOutput {
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub url: String,
}

impl TinifyClient {
    pub fn new(api_key: &str) -> Result<Self, CompressError> {
        Self::with_base_url(TINIFY_API_BASE, api_key, Duration::from_secs(60))
    }

    /// Create a client against a custom base URL (e.g., a test server)
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, CompressError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upload raw image bytes for compression
    pub async fn shrink(&self, data: Bytes) -> Result<ShrinkOutput, CompressError> {
        let url = format!("{}/shrink", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompressError::Upstream { status, body });
        }

        let body: ShrinkResponse = response.json().await?;
        tracing::debug!(
            "Tinify output: {} bytes of {}",
            body.output.size,
            body.output.content_type
        );
        Ok(body.output)
    }

    /// Download the compressed image from the output URL
    pub async fn download(&self, url: &str) -> Result<Bytes, CompressError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompressError::Upstream { status, body });
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl Compressor for TinifyClient {
    async fn compress(&self, data: Bytes) -> Result<CompressedImage, CompressError> {
        let output = self.shrink(data).await?;
        let data = self.download(&output.url).await?;
        Ok(CompressedImage {
            data,
            content_type: output.content_type,
            size: output.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shrink_response() {
        let body = r#"{
            "input": {"size": 207565, "type": "image/png"},
            "output": {"size": 63669, "type": "image/png", "width": 400, "height": 400,
                       "ratio": 0.3067, "url": "https://api.tinify.com/output/2xnsp7jn34e5"}
        }"#;
        let parsed: ShrinkResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.output.size, 63669);
        assert_eq!(parsed.output.content_type, "image/png");
        assert_eq!(parsed.output.url, "https://api.tinify.com/output/2xnsp7jn34e5");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            TinifyClient::with_base_url("http://127.0.0.1:9/", "key", Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9");
    }
}
