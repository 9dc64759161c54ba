#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plan dataset loading.
//!
//! The explorer ships four static datasets: land-use designations, zoning
//! districts, policies and the municipal boundary. A [`DatasetSource`]
//! fetches their raw text (from disk, over HTTP, or from memory) and the
//! [`PlanRepository`] parses the three tabular datasets once and serves
//! keyed lookups for the rest of the process lifetime.

pub mod repository;
pub mod source;

pub use repository::{PlanRepository, PlanTables};
pub use source::{DatasetSource, FileSource, HttpSource, StaticSource};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// One of the static datasets the explorer consumes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dataset {
    /// Land-use designation table, keyed by designation code.
    LandUse,
    /// Zoning district table, nested by category then zone code.
    Zoning,
    /// Policy table, nested by category then policy key.
    Policies,
    /// Municipal boundary `GeoJSON`.
    Boundary,
}

impl Dataset {
    /// File name of this dataset relative to the data root.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::LandUse => "land_use.json",
            Self::Zoning => "zoning.json",
            Self::Policies => "policies.json",
            Self::Boundary => "boundary.geojson",
        }
    }
}

/// Errors fetching or parsing a dataset.
#[derive(Debug, Error)]
pub enum DataError {
    /// Reading a dataset file failed.
    #[error("I/O error reading {dataset}: {source}")]
    Io {
        /// Which dataset.
        dataset: Dataset,
        /// Underlying error.
        source: std::io::Error,
    },

    /// HTTP request for a dataset failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The dataset server returned a non-success status.
    #[error("HTTP {status} fetching {dataset}")]
    Status {
        /// Which dataset.
        dataset: Dataset,
        /// Response status code.
        status: u16,
    },

    /// The dataset is not valid JSON for its schema.
    #[error("JSON error in {dataset}: {source}")]
    Json {
        /// Which dataset.
        dataset: Dataset,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The source has no such dataset.
    #[error("Dataset {dataset} is not available")]
    Missing {
        /// Which dataset.
        dataset: Dataset,
    },
}

/// Cloneable summary of a failed load.
///
/// A single in-flight load is shared by every caller awaiting it, so the
/// failure handed to each of them has to be cloneable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Plan data unavailable: {message}")]
pub struct LoadError {
    /// Description of the underlying [`DataError`].
    pub message: String,
}

impl From<DataError> for LoadError {
    fn from(e: DataError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
