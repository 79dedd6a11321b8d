use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::logging::{log_dataset_loaded, ProfileScope};
use crate::series::RawDataset;

mod fetch;

pub use fetch::DefaultFetcher;

/// Where a trace file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Http(Url),
    File(PathBuf),
}

impl Location {
    /// Resolve a configured location.
    ///
    /// Absolute `http(s)://` and `file://` URLs are used as-is. Anything else
    /// is relative: joined onto `base` when a base URL is configured,
    /// otherwise read from `data_dir` with any leading `/` stripped.
    pub fn resolve(raw: &str, base: Option<&Url>, data_dir: &Path) -> Result<Self, SourceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SourceError::InvalidLocation("empty location".to_string()));
        }
        if let Ok(url) = Url::parse(raw) {
            return Self::from_url(url);
        }
        match base {
            Some(base) => {
                let joined = base
                    .join(raw)
                    .map_err(|e| SourceError::InvalidLocation(format!("{}: {}", raw, e)))?;
                Self::from_url(joined)
            }
            None => Ok(Location::File(data_dir.join(raw.trim_start_matches('/')))),
        }
    }

    fn from_url(url: Url) -> Result<Self, SourceError> {
        match url.scheme() {
            "http" | "https" => Ok(Location::Http(url)),
            "file" => url
                .to_file_path()
                .map(Location::File)
                .map_err(|_| SourceError::InvalidLocation(url.to_string())),
            other => Err(SourceError::InvalidLocation(format!(
                "unsupported scheme {}: {}",
                other, url
            ))),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Http(url) => write!(f, "{}", url),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("body is not a JSON array of samples: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid location: {0}")]
    InvalidLocation(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("load cancelled")]
    Cancelled,

    #[error("failed to load {location}: {source}")]
    Failed {
        location: String,
        #[source]
        source: SourceError,
    },
}

impl LoadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

/// Transport for raw trace bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, location: &Location) -> Result<Vec<u8>, SourceError>;
}

/// Loads the two trace files of a comparison.
pub struct DataSource<F> {
    fetcher: F,
}

impl<F: Fetcher> DataSource<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch and decode both datasets concurrently.
    ///
    /// Fails as a whole: the first fetch or decode error wins and the other
    /// request is dropped. Once `cancel` fires the result is `Cancelled` no
    /// matter how far the requests got.
    pub async fn load(
        &self,
        locations: &[Location; 2],
        cancel: &CancellationToken,
    ) -> Result<[RawDataset; 2], LoadError> {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let _profile = ProfileScope::new("source.load");

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            joined = async {
                tokio::try_join!(self.load_one(&locations[0]), self.load_one(&locations[1]))
            } => joined,
        };
        let (first, second) = joined?;

        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok([first, second])
    }

    async fn load_one(&self, location: &Location) -> Result<RawDataset, LoadError> {
        let failed = |source| LoadError::Failed {
            location: location.to_string(),
            source,
        };
        let body = self.fetcher.fetch(location).await.map_err(failed)?;
        let dataset = RawDataset::from_json_slice(&body).map_err(|e| failed(e.into()))?;
        log_dataset_loaded(
            &location.to_string(),
            body.len(),
            dataset.len(),
            &fingerprint(&body),
        );
        Ok(dataset)
    }
}

/// Hex SHA-256 of a fetched body.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
