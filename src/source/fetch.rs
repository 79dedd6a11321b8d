use async_trait::async_trait;
use reqwest::Client;

use super::{Fetcher, Location, SourceError};

/// Fetches over HTTP with reqwest and reads local files with tokio.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    client: Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_http(&self, url: &url::Url) -> Result<Vec<u8>, SourceError> {
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch(&self, location: &Location) -> Result<Vec<u8>, SourceError> {
        match location {
            Location::Http(url) => self.fetch_http(url).await,
            Location::File(path) => tokio::fs::read(path).await.map_err(|source| SourceError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}
