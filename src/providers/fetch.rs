//! HTTP content fetcher for raw item payloads.
//!
//! Single attempt only. Ad-serving CDNs answer a dead creative with a
//! permanent 404.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use super::traits::ContentFetcher;
use crate::{HuginnError, Result};

/// Streams a URL to a local file.
#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(300))
    }

    /// Create a fetcher with a custom overall request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .map_err(|e| HuginnError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_to(&self, uri: &str, dest: &Path) -> Result<u64> {
        let fetch_err = |reason: String| HuginnError::Fetch {
            url: uri.to_string(),
            reason,
        };

        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| fetch_err(format!("cannot create {}: {e}", dest.display())))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_err(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| fetch_err(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| fetch_err(e.to_string()))?;

        Ok(written)
    }
}
