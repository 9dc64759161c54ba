#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Answers "what does the plan say about this coordinate".
//!
//! Combines the [`BoundaryStore`] with the [`PlanRepository`]. Points
//! outside the municipal boundary get no designation at all. Points inside
//! get a designation and zone from a latitude-banded heuristic configured
//! in the [`MunicipalityProfile`]; this stands in for a parcel-level
//! spatial join and is not derived from zoning geometry. The attached
//! policies come from one fixed category and do not depend on the point.

pub mod profile;

use std::sync::Arc;

use ocp_explorer_boundary::BoundaryStore;
use ocp_explorer_data::{DatasetSource, PlanRepository};
use ocp_explorer_plan_models::{Coordinates, LocationInfo};

pub use profile::{LatitudeBand, MunicipalityProfile};

/// Resolves coordinates to plan designations.
pub struct LocationResolver {
    boundary: BoundaryStore,
    repository: Arc<PlanRepository>,
    profile: MunicipalityProfile,
}

impl LocationResolver {
    /// Creates a resolver from already-loaded parts.
    #[must_use]
    pub const fn new(
        boundary: BoundaryStore,
        repository: Arc<PlanRepository>,
        profile: MunicipalityProfile,
    ) -> Self {
        Self {
            boundary,
            repository,
            profile,
        }
    }

    /// Loads the boundary from `source` (falling back to the profile's
    /// bounding box) and builds a resolver.
    pub async fn load(
        source: &dyn DatasetSource,
        repository: Arc<PlanRepository>,
        profile: MunicipalityProfile,
    ) -> Self {
        let boundary = BoundaryStore::load_or_fallback(source, profile.fallback_bounds).await;
        Self::new(boundary, repository, profile)
    }

    /// The boundary store.
    #[must_use]
    pub const fn boundary(&self) -> &BoundaryStore {
        &self.boundary
    }

    /// The plan repository designations are looked up in.
    #[must_use]
    pub const fn repository(&self) -> &Arc<PlanRepository> {
        &self.repository
    }

    /// The municipality profile.
    #[must_use]
    pub const fn profile(&self) -> &MunicipalityProfile {
        &self.profile
    }

    /// Resolves `(lat, lng)`. Missing data yields `None`s, never an error.
    #[must_use]
    pub fn resolve(&self, lat: f64, lng: f64) -> LocationInfo {
        let hit = self.boundary.contains(lat, lng);
        let coordinates = Coordinates::new(lat, lng);

        if !hit.inside {
            log::debug!("({lat}, {lng}) is outside the boundary");
            return LocationInfo {
                coordinates,
                within_boundary: false,
                boundary_precision: hit.precision,
                land_use: None,
                zoning: None,
                policies: Vec::new(),
            };
        }

        let band = self.profile.band_for(lat);
        let land_use = band
            .and_then(|b| self.repository.get_land_use(&b.land_use))
            .cloned();
        let zoning = band
            .and_then(|b| self.repository.get_zoning(&b.zoning))
            .cloned();

        let policies = self
            .repository
            .get_policies_by_category(&self.profile.relevant_policy_category)
            .into_iter()
            .take(self.profile.relevant_policy_count)
            .cloned()
            .collect();

        LocationInfo {
            coordinates,
            within_boundary: true,
            boundary_precision: hit.precision,
            land_use,
            zoning,
            policies,
        }
    }
}
