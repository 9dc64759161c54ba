//! Municipality-specific constants, embedded from `municipality.toml`.

use ocp_explorer_plan_models::{BoundingBox, Coordinates};
use serde::Deserialize;

const DEFAULT_PROFILE_TOML: &str = include_str!("../municipality.toml");

/// Constants describing the municipality the explorer covers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MunicipalityProfile {
    /// Display name.
    pub name: String,
    /// Documented city-centre coordinate.
    pub centre: Coordinates,
    /// Rectangle used when the boundary geometry is unavailable.
    pub fallback_bounds: BoundingBox,
    /// Policy category attached to every in-boundary lookup.
    pub relevant_policy_category: String,
    /// How many policies from that category to attach.
    #[serde(default = "default_policy_count")]
    pub relevant_policy_count: usize,
    /// Latitude bands, checked in order.
    pub bands: Vec<LatitudeBand>,
}

/// One band of the latitude heuristic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LatitudeBand {
    /// Exclusive southern limit. `None` matches any latitude.
    #[serde(default)]
    pub min_lat: Option<f64>,
    /// Land-use designation code for the band.
    pub land_use: String,
    /// Zoning district code for the band.
    pub zoning: String,
}

impl LatitudeBand {
    /// Whether `lat` falls in this band.
    #[must_use]
    pub fn matches(&self, lat: f64) -> bool {
        self.min_lat.is_none_or(|min| lat > min)
    }
}

const fn default_policy_count() -> usize {
    2
}

impl MunicipalityProfile {
    /// Parses a profile from TOML.
    ///
    /// # Errors
    ///
    /// Returns the `toml` deserialization error if the document is invalid.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(text)
    }

    /// The band that applies at `lat`, if any.
    #[must_use]
    pub fn band_for(&self, lat: f64) -> Option<&LatitudeBand> {
        self.bands.iter().find(|band| band.matches(lat))
    }
}

impl Default for MunicipalityProfile {
    /// The embedded New Westminster profile.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. It is a compile-time
    /// constant, so a failure is a development error caught by tests.
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_PROFILE_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded municipality profile: {e}"))
    }
}
