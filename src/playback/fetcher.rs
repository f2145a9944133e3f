//! Manifest transport

use async_trait::async_trait;
use url::Url;

use super::error::PlaybackError;

/// Fetches playlist text from a delivery URL
///
/// The player applies its own timeout around each call.
#[async_trait]
pub trait ManifestFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &Url) -> Result<String, PlaybackError>;
}

/// HTTP fetcher backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct HttpManifestFetcher {
    client: reqwest::Client,
}

impl HttpManifestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client and its connection pool
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, PlaybackError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}
