//! Where dataset text comes from.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{DataError, Dataset};

/// Fetches the raw text of a dataset.
#[async_trait::async_trait]
pub trait DatasetSource: Send + Sync {
    /// Returns the full contents of `dataset`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] if the dataset cannot be read.
    async fn fetch(&self, dataset: Dataset) -> Result<String, DataError>;
}

/// Reads datasets from files in a directory.
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Creates a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl DatasetSource for FileSource {
    async fn fetch(&self, dataset: Dataset) -> Result<String, DataError> {
        let path = self.root.join(dataset.file_name());
        log::debug!("Reading {dataset} from {}", path.display());

        tokio::fs::read_to_string(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DataError::Missing { dataset }
            } else {
                DataError::Io { dataset, source }
            }
        })
    }
}

/// Fetches datasets over HTTP from `{base_url}/{file_name}`.
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// Creates a source that fetches from `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl DatasetSource for HttpSource {
    async fn fetch(&self, dataset: Dataset) -> Result<String, DataError> {
        let url = format!("{}/{}", self.base_url, dataset.file_name());
        log::debug!("Fetching {dataset} from {url}");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Status {
                dataset,
                status: status.as_u16(),
            });
        }

        Ok(resp.text().await?)
    }
}

/// Serves datasets from memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    datasets: BTreeMap<Dataset, String>,
}

impl StaticSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the contents of `dataset`.
    #[must_use]
    pub fn with(mut self, dataset: Dataset, contents: impl Into<String>) -> Self {
        self.datasets.insert(dataset, contents.into());
        self
    }
}

#[async_trait::async_trait]
impl DatasetSource for StaticSource {
    async fn fetch(&self, dataset: Dataset) -> Result<String, DataError> {
        self.datasets
            .get(&dataset)
            .cloned()
            .ok_or(DataError::Missing { dataset })
    }
}
