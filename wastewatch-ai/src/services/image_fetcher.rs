//! Report image download

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("Empty image body from {0}")]
    Empty(String),
}

/// Source of report image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError>;
}

/// Plain HTTP GET against the blob store URL recorded on the report
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ImageFetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageFetchError::Network {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        let network = |e: reqwest::Error| ImageFetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.http_client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let bytes = response.bytes().await.map_err(network)?;
        if bytes.is_empty() {
            return Err(ImageFetchError::Empty(url.to_string()));
        }

        tracing::debug!(
            url,
            content_type = %content_type,
            size_bytes = bytes.len(),
            "Downloaded report image"
        );

        Ok(bytes.to_vec())
    }
}
