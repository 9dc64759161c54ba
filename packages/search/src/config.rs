//! Search tuning knobs, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Search orchestrator settings.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when a search does not ask for a specific number.
    pub max_results: usize,
    /// Cached search results kept before the oldest is evicted.
    pub cache_capacity: usize,
    /// Seconds a cached result stays valid. `0` keeps results until evicted.
    pub cache_ttl_secs: u64,
    /// Searches kept in the history list.
    pub history_capacity: usize,
    /// Seconds to wait for the AI proxy before falling back to local search.
    pub ai_timeout_secs: u64,
    /// Suggestions returned per request.
    pub suggestion_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            cache_capacity: 50,
            cache_ttl_secs: 30 * 60,
            history_capacity: 20,
            ai_timeout_secs: 30,
            suggestion_limit: 5,
        }
    }
}

/// Errors reading a [`SearchConfig`] file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`SearchConfig`].
    #[error("Invalid search config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SearchConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has a
    /// mistyped field.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Toml`] if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_toml_str(&text)?)
    }

    /// Cache expiry, or `None` when expiry is disabled.
    #[must_use]
    pub const fn cache_ttl(&self) -> Option<Duration> {
        if self.cache_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.cache_ttl_secs))
        }
    }

    /// Timeout applied to AI proxy requests.
    #[must_use]
    pub const fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(
            SearchConfig::from_toml_str("").unwrap(),
            SearchConfig::default()
        );
    }

    #[test]
    fn partial_document_overrides_named_keys() {
        let config = SearchConfig::from_toml_str("max_results = 5\ncache_ttl_secs = 0\n").unwrap();
        assert_eq!(config.max_results, 5);
        assert_eq!(config.cache_ttl(), None);
        assert_eq!(config.history_capacity, 20);
    }

    #[test]
    fn default_ttl_is_thirty_minutes() {
        assert_eq!(
            SearchConfig::default().cache_ttl(),
            Some(Duration::from_secs(1800))
        );
    }

    #[test]
    fn mistyped_field_is_an_error() {
        assert!(SearchConfig::from_toml_str("max_results = \"ten\"").is_err());
    }
}
