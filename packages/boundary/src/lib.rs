#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Municipal boundary store.
//!
//! Parses the boundary `GeoJSON` into a flat set of closed rings, indexes
//! their envelopes in an R-tree, and answers point-in-boundary queries by
//! testing every ring whose envelope contains the point. Each ring is kept
//! as its own hole-free polygon. A
//! point is inside the boundary when any ring contains it, which treats the
//! separate parts of a multipolygon (main city plus the detached enclave)
//! as a union. Hole rings are not subtracted: a point inside a hole is
//! still reported inside.
//!
//! When no geometry is available the store answers from a fixed bounding
//! box and marks the answer [`BoundaryPrecision::Approximate`].

use geo::{BoundingRect, Contains, LineString, Point, Polygon};
use geojson::GeoJson;
use ocp_explorer_data::{DataError, Dataset, DatasetSource};
use ocp_explorer_plan_models::{BoundaryPrecision, BoundingBox};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Errors building a [`BoundarySet`].
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The boundary dataset could not be fetched.
    #[error(transparent)]
    Data(#[from] DataError),

    /// The boundary text is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The dataset contains no polygon rings.
    #[error("Boundary dataset contains no polygons")]
    Empty,
}

/// A closed ring stored in the R-tree as a hole-free polygon.
struct RingEntry {
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for RingEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Every ring of every polygon in the boundary dataset.
///
/// Built wholesale from one dataset and never mutated afterwards.
pub struct BoundarySet {
    rings: RTree<RingEntry>,
}

impl BoundarySet {
    /// Fetches and parses the boundary dataset from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the dataset cannot be fetched, is not
    /// valid `GeoJSON`, or holds no polygons.
    pub async fn load(source: &dyn DatasetSource) -> Result<Self, BoundaryError> {
        let text = source.fetch(Dataset::Boundary).await?;
        let set = Self::from_geojson(&text)?;
        log::info!("Loaded {} boundary rings", set.len());
        Ok(set)
    }

    /// Parses a `GeoJSON` feature collection, feature or bare geometry.
    ///
    /// Polygon and multipolygon geometries contribute all of their rings,
    /// exterior and interior alike. Other geometry types are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::GeoJson`] for malformed input and
    /// [`BoundaryError::Empty`] if no rings were found.
    pub fn from_geojson(text: &str) -> Result<Self, BoundaryError> {
        let geojson: GeoJson = text.parse()?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
            GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
            GeoJson::Geometry(geometry) => vec![geometry],
        };

        let mut rings = Vec::new();
        for geometry in geometries {
            let geometry: geo::Geometry<f64> = geometry.try_into()?;
            collect_rings(geometry, &mut rings);
        }

        if rings.is_empty() {
            return Err(BoundaryError::Empty);
        }

        Ok(Self::from_rings(rings))
    }

    /// Builds a set directly from closed rings of `(lng, lat)` coordinates.
    #[must_use]
    pub fn from_rings(rings: Vec<LineString<f64>>) -> Self {
        let entries = rings
            .into_iter()
            .filter(|ring| ring.0.len() >= 3)
            .map(|ring| {
                let polygon = Polygon::new(ring, vec![]);
                RingEntry {
                    envelope: compute_envelope(&polygon),
                    polygon,
                }
            })
            .collect();

        Self {
            rings: RTree::bulk_load(entries),
        }
    }

    /// Number of rings in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rings.size()
    }

    /// Whether the set has no rings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rings.size() == 0
    }

    /// Whether any ring contains the point. Points exactly on a ring's
    /// edge are not contained by that ring.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);
        self.rings
            .locate_in_envelope_intersecting(&query_env)
            .any(|entry| entry.polygon.contains(&point))
    }
}

/// A point-in-boundary answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryHit {
    /// Whether the point is inside.
    pub inside: bool,
    /// Whether the answer came from geometry or the fallback box.
    pub precision: BoundaryPrecision,
}

/// Point-in-boundary lookups with a bounding-box fallback.
pub struct BoundaryStore {
    set: Option<BoundarySet>,
    fallback: BoundingBox,
}

impl BoundaryStore {
    /// Creates a store with geometry.
    #[must_use]
    pub const fn new(set: BoundarySet, fallback: BoundingBox) -> Self {
        Self {
            set: Some(set),
            fallback,
        }
    }

    /// Creates a store with no geometry; every answer is approximate.
    #[must_use]
    pub const fn fallback_only(fallback: BoundingBox) -> Self {
        Self {
            set: None,
            fallback,
        }
    }

    /// Loads the boundary from `source`, degrading to the fallback box if
    /// the dataset is unavailable or unusable.
    pub async fn load_or_fallback(source: &dyn DatasetSource, fallback: BoundingBox) -> Self {
        match BoundarySet::load(source).await {
            Ok(set) => Self::new(set, fallback),
            Err(e) => {
                log::warn!("Boundary unavailable, using bounding box fallback: {e}");
                Self::fallback_only(fallback)
            }
        }
    }

    /// Whether precise geometry is loaded.
    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.set.as_ref().is_some_and(|set| !set.is_empty())
    }

    /// Tests whether `(lat, lng)` is inside the municipal boundary.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> BoundaryHit {
        match &self.set {
            Some(set) if !set.is_empty() => BoundaryHit {
                inside: set.contains(lat, lng),
                precision: BoundaryPrecision::Exact,
            },
            _ => BoundaryHit {
                inside: self.fallback.contains(lat, lng),
                precision: BoundaryPrecision::Approximate,
            },
        }
    }
}

fn collect_rings(geometry: geo::Geometry<f64>, rings: &mut Vec<LineString<f64>>) {
    match geometry {
        geo::Geometry::Polygon(polygon) => {
            let (exterior, interiors) = polygon.into_inner();
            rings.push(exterior);
            rings.extend(interiors);
        }
        geo::Geometry::MultiPolygon(multi) => {
            for polygon in multi {
                collect_rings(geo::Geometry::Polygon(polygon), rings);
            }
        }
        geo::Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect_rings(geometry, rings);
            }
        }
        _ => {}
    }
}

fn compute_envelope(polygon: &Polygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocp_explorer_data::StaticSource;

    const SHIPPED: &str = include_str!("../../../data/boundary.geojson");

    const FALLBACK: BoundingBox = BoundingBox::new(-122.97, 49.17, -122.87, 49.24);

    /// Points: city centre, enclave, outside-in-box, far outside.
    const SAMPLE_POINTS: &[(f64, f64)] = &[
        (49.2057, -122.9110),
        (49.185, -122.948),
        (49.175, -122.88),
        (49.30, -123.10),
    ];

    #[test]
    fn city_centre_is_inside() {
        let set = BoundarySet::from_geojson(SHIPPED).unwrap();
        assert!(set.contains(49.2057, -122.9110));
    }

    #[test]
    fn enclave_is_inside() {
        let set = BoundarySet::from_geojson(SHIPPED).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(49.185, -122.948));
    }

    #[test]
    fn points_outside_every_ring_and_the_box_are_outside() {
        let store = BoundaryStore::new(BoundarySet::from_geojson(SHIPPED).unwrap(), FALLBACK);
        for (lat, lng) in [(49.30, -123.10), (49.0, -122.9), (49.21, -122.5)] {
            assert!(!FALLBACK.contains(lat, lng));
            let hit = store.contains(lat, lng);
            assert!(!hit.inside, "({lat}, {lng}) reported inside");
            assert_eq!(hit.precision, BoundaryPrecision::Exact);
        }
    }

    #[test]
    fn point_in_box_but_outside_rings_depends_on_precision() {
        let exact = BoundaryStore::new(BoundarySet::from_geojson(SHIPPED).unwrap(), FALLBACK);
        let approximate = BoundaryStore::fallback_only(FALLBACK);

        let hit = exact.contains(49.175, -122.88);
        assert!(!hit.inside);
        assert_eq!(hit.precision, BoundaryPrecision::Exact);

        let hit = approximate.contains(49.175, -122.88);
        assert!(hit.inside);
        assert_eq!(hit.precision, BoundaryPrecision::Approximate);
    }

    #[test]
    fn hole_rings_are_not_subtracted() {
        // A square with a square hole. Each ring votes independently, so the
        // point inside the hole is still reported inside.
        let text = r#"{
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
            ]
        }"#;
        let set = BoundarySet::from_geojson(text).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(5.0, 5.0));
        assert!(set.contains(2.0, 2.0));
        assert!(!set.contains(11.0, 5.0));
    }

    #[test]
    fn edge_points_are_outside() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (0.0, 4.0),
            (0.0, 0.0),
        ]);
        let set = BoundarySet::from_rings(vec![ring]);
        assert!(set.contains(2.0, 2.0));
        assert!(!set.contains(2.0, 4.0));
        assert!(!set.contains(0.0, 0.0));
    }

    #[test]
    fn concave_ring_excludes_notch() {
        // U shape opening north; the notch between the arms is outside.
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (6.0, 0.0),
            (6.0, 6.0),
            (4.0, 6.0),
            (4.0, 2.0),
            (2.0, 2.0),
            (2.0, 6.0),
            (0.0, 6.0),
            (0.0, 0.0),
        ]);
        let set = BoundarySet::from_rings(vec![ring]);
        assert!(set.contains(1.0, 3.0));
        assert!(set.contains(5.0, 1.0));
        assert!(set.contains(5.0, 5.0));
        assert!(!set.contains(3.0, 3.0));
        assert!(!set.contains(5.0, 3.0));
    }

    #[test]
    fn non_polygon_geometry_is_empty() {
        let text = r#"{ "type": "Point", "coordinates": [-122.91, 49.2] }"#;
        assert!(matches!(
            BoundarySet::from_geojson(text),
            Err(BoundaryError::Empty)
        ));
    }

    #[test]
    fn malformed_geojson_is_an_error() {
        assert!(matches!(
            BoundarySet::from_geojson("{ \"type\": \"Nope\" }"),
            Err(BoundaryError::GeoJson(_))
        ));
    }

    #[tokio::test]
    async fn missing_dataset_degrades_to_fallback() {
        let store = BoundaryStore::load_or_fallback(&StaticSource::new(), FALLBACK).await;
        assert!(!store.has_geometry());
        let hit = store.contains(49.2057, -122.9110);
        assert!(hit.inside);
        assert_eq!(hit.precision, BoundaryPrecision::Approximate);
    }

    #[tokio::test]
    async fn loading_twice_gives_identical_answers() {
        let source = StaticSource::new().with(Dataset::Boundary, SHIPPED);
        let first = BoundaryStore::load_or_fallback(&source, FALLBACK).await;
        let second = BoundaryStore::load_or_fallback(&source, FALLBACK).await;
        assert!(first.has_geometry() && second.has_geometry());

        for &(lat, lng) in SAMPLE_POINTS {
            assert_eq!(first.contains(lat, lng), second.contains(lat, lng));
        }
    }
}
