#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plan search for the OCP explorer.
//!
//! [`LocalSearchEngine`] matches keywords, category words and height
//! phrases against the plan tables. [`SearchOrchestrator`] sits in front of
//! it: it normalizes the query, serves repeats from a [`SearchCache`],
//! decides between local search and the AI proxy (falling back to local
//! search when the AI path fails) and keeps a [`SearchHistory`].

pub mod cache;
pub mod config;
pub mod height;
pub mod history;
pub mod local;
pub mod normalize;
pub mod orchestrator;

use ocp_explorer_ai_models::QuestionError;
use ocp_explorer_data::LoadError;
use thiserror::Error;

pub use cache::SearchCache;
pub use config::{ConfigError, SearchConfig};
pub use height::{HeightRange, parse_height_range};
pub use history::{HistoryEntry, SearchHistory};
pub use local::LocalSearchEngine;
pub use normalize::normalize_query;
pub use orchestrator::{SearchMode, SearchOptions, SearchOrchestrator};

/// Errors the orchestrator turns into error-shaped results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query was rejected before dispatch.
    #[error("Invalid query: {0}")]
    QueryInvalid(#[from] QuestionError),

    /// The plan data could not be loaded.
    #[error(transparent)]
    DataUnavailable(#[from] LoadError),

    /// Anything else, including panics caught at the outer boundary.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
