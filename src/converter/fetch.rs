// HTTP stream fetcher
//
// Downloads one stream URL to a local path in chunks. No resume support:
// a failed transfer leaves cleanup to the caller, which removes the
// partial file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::errors::ConvertError;
use super::models::{CatalogConfig, MediaStream};
use super::traits::StreamFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher honoring the catalog's proxy setting. Only the
    /// connect phase is bounded; large transfers get no total timeout.
    pub fn new(config: &CatalogConfig) -> Result<Self, ConvertError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.timeout_seconds));

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                ConvertError::OperationFailed(format!("Invalid proxy URL {}: {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ConvertError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl StreamFetcher for HttpFetcher {
    async fn fetch(&self, stream: &MediaStream, dest: &Path) -> Result<(), ConvertError> {
        eprintln!(
            "[Fetch] format {} ({}) -> {}",
            stream.id,
            stream.mime_type,
            dest.display()
        );

        let mut response = self
            .client
            .get(&stream.url)
            .send()
            .await
            .map_err(|e| ConvertError::OperationFailed(format!("Request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ConvertError::OperationFailed(format!("Server rejected download: {}", e)))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ConvertError::OperationFailed(format!("Cannot create {}: {}", dest.display(), e)))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ConvertError::OperationFailed(format!("Transfer failed: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ConvertError::OperationFailed(format!("Write failed: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| ConvertError::OperationFailed(format!("Flush failed: {}", e)))?;

        eprintln!("[Fetch] {} bytes written to {}", written, dest.display());
        Ok(())
    }
}
