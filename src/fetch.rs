//! HTTP fetch collaborator used for harvested image URLs.
//!
//! The harvester only needs "bytes or nothing": a broken link in a design
//! doc must not stop a draft, so every failure collapses to `None` and is
//! logged at `warn`.

use crate::error::RfcError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetch a URL's body.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Body bytes on a 2xx response; `None` on any failure.
    async fn get(&self, url: &str) -> Option<Vec<u8>>;
}

/// [`HttpFetch`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, RfcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RfcError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Fetch {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Fetch {} returned HTTP {}", url, response.status());
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => {
                debug!("Fetched {} ({} bytes)", url, bytes.len());
                Some(bytes.to_vec())
            }
            Err(e) => {
                warn!("Fetch {} body read failed: {}", url, e);
                None
            }
        }
    }
}

/// Fetcher that never returns anything; for offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl HttpFetch for OfflineFetcher {
    async fn get(&self, url: &str) -> Option<Vec<u8>> {
        debug!("Offline: skipping fetch of {}", url);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_yields_none() {
        let f = ReqwestFetcher::new(2).unwrap();
        assert!(f.get("http://127.0.0.1:1/diagram.png").await.is_none());
    }

    #[tokio::test]
    async fn malformed_url_yields_none() {
        let f = ReqwestFetcher::new(2).unwrap();
        assert!(f.get("not a url").await.is_none());
    }

    #[tokio::test]
    async fn offline_fetcher_is_empty() {
        assert!(OfflineFetcher.get("https://example.com/a.png").await.is_none());
    }
}
