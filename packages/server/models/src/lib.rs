#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the OCP explorer server.
//!
//! Search results and location lookups are returned as the plan model types
//! directly; this crate only holds the query-string shapes and the small
//! envelopes the server adds around them. The AI proxy endpoint's wire
//! types live in `ocp_explorer_ai_models`.

use ocp_explorer_plan_models::BoundaryPrecision;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Whether the plan tables have loaded.
    pub data_loaded: bool,
    /// Precision of boundary answers: `exact` with geometry loaded,
    /// `approximate` on the bounding-box fallback.
    pub boundary: BoundaryPrecision,
}

/// Query parameters for the location endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocationQueryParams {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// Query parameters for the search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQueryParams {
    /// Search query.
    #[serde(default)]
    pub q: String,
    /// `auto`, `local` or `ai`.
    pub mode: Option<String>,
    /// Latitude of the location the query is about.
    pub lat: Option<f64>,
    /// Longitude of the location the query is about.
    pub lng: Option<f64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Query parameters for the suggestions endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionQueryParams {
    /// Partially typed query.
    #[serde(default)]
    pub q: String,
}

/// Suggestions response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuggestions {
    /// Completions, history first.
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_serializes_camel_case() {
        let health = ApiHealth {
            healthy: true,
            version: "0.1.0".to_string(),
            data_loaded: false,
            boundary: BoundaryPrecision::Approximate,
        };
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["dataLoaded"], false);
        assert_eq!(json["boundary"], "approximate");
    }

    #[test]
    fn search_params_default_empty_query() {
        let params: SearchQueryParams = serde_json::from_str(r#"{"mode":"local"}"#).unwrap();
        assert_eq!(params.q, "");
        assert_eq!(params.mode.as_deref(), Some("local"));
        assert!(params.lat.is_none());
    }
}
