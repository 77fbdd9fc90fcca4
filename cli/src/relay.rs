//! Client for the compression relay

use anyhow::anyhow;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Clone)]
pub struct RelayClient {
    http_client: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.to_string(),
        })
    }

    /// Send raw image bytes through the relay and return the compressed bytes
    pub async fn compress(&self, data: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http_client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<RelayErrorBody>(&body) {
                Ok(RelayErrorBody {
                    error,
                    details: Some(details),
                }) => format!("{}: {}", error, details),
                Ok(RelayErrorBody { error, .. }) => error,
                Err(_) => body,
            };
            return Err(anyhow!("Compression failed ({}): {}", status, message));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
