#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Official Community Plan data types.
//!
//! Defines the land-use designations, zoning districts and policies loaded
//! from the static plan datasets, the [`LocationInfo`] answer for a map
//! click, and the [`SearchResult`] envelope returned by the search
//! orchestrator. These types are shared by every crate in the workspace and
//! serialize to the camelCase JSON shapes the datasets and the API use.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Height of one storey when converting storey counts to metres.
pub const STOREY_HEIGHT_METRES: f64 = 3.0;

/// Regex alternation of the unit words a height may carry. Used by every
/// height parser so plan values and queries accept the same spellings.
pub const HEIGHT_UNIT_PATTERN: &str = r"storeys?|stor(?:y|ies)|floors?|metres?|meters?|m";

static HEIGHT_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:({HEIGHT_UNIT_PATTERN})\b)?\s*$"
    ))
    .expect("valid regex")
});

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and within WGS84 ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// An axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western longitude.
    pub west: f64,
    /// Southern latitude.
    pub south: f64,
    /// Eastern longitude.
    pub east: f64,
    /// Northern latitude.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a bounding box from `west, south, east, north`.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lng)
    }
}

/// Whether a boundary answer came from real geometry or the rectangular
/// fallback used when the geometry could not be loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BoundaryPrecision {
    /// Ray-cast against the loaded boundary rings.
    Exact,
    /// Tested against the fallback bounding box only.
    Approximate,
}

/// Broad land-use category a designation belongs to.
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
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum LandUseCategory {
    /// Detached, ground-oriented and apartment housing
    Residential,
    /// Retail, office and service commercial
    Commercial,
    /// Combined residential and commercial
    MixedUse,
    /// Industrial and employment lands
    Employment,
    /// Parks, open space and ecologically sensitive areas
    Environmental,
    /// Schools, hospitals and civic facilities
    Institutional,
}

/// A land-use designation from the plan's designation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandUseDesignation {
    /// Designation code (e.g. `"RD"`). Filled from the table key on load.
    #[serde(default)]
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Description of intent.
    pub description: String,
    /// Broad category.
    pub category: LandUseCategory,
    /// Maximum density, as written in the plan (e.g. `"1.0 FSR"`).
    pub max_density: String,
    /// Maximum height, as written in the plan (e.g. `"4 storeys"`).
    #[serde(default)]
    pub max_height: Option<String>,
    /// Principal permitted uses, in plan order.
    #[serde(default)]
    pub principal_uses: Vec<String>,
    /// Complementary uses, in plan order.
    #[serde(default)]
    pub complementary_uses: Vec<String>,
}

impl LandUseDesignation {
    /// Lower-cased text that keyword search matches against.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        let mut text = format!("{} {} {}", self.name, self.description, self.category);
        for value in self.principal_uses.iter().chain(&self.complementary_uses) {
            text.push(' ');
            text.push_str(value);
        }
        text.to_lowercase()
    }
}

/// A zoning district from the zoning bylaw table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoningDistrict {
    /// Zone code (e.g. `"RS1"`). Filled from the table key on load.
    #[serde(default)]
    pub code: String,
    /// Name of the category the zone is nested under. Filled on load.
    #[serde(default)]
    pub category: String,
    /// Human-readable name.
    pub name: String,
    /// Optional description of intent.
    #[serde(default)]
    pub description: Option<String>,
    /// Maximum height with unit (e.g. `"12m"`, `"4 storeys"`).
    #[serde(default)]
    pub max_height: Option<String>,
    /// Maximum floor area ratio.
    #[serde(default, rename = "maxFAR")]
    pub max_far: Option<f64>,
    /// Maximum lot coverage (e.g. `"40%"`).
    #[serde(default)]
    pub lot_coverage: Option<String>,
}

impl ZoningDistrict {
    /// Lower-cased text that keyword search matches against.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.description.as_deref().unwrap_or_default(),
            self.category
        )
        .to_lowercase()
    }

    /// Maximum height in metres, if one is set and parses.
    #[must_use]
    pub fn max_height_metres(&self) -> Option<f64> {
        self.max_height.as_deref().and_then(parse_height_metres)
    }
}

/// A policy statement from the plan's policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy category (e.g. `"housing"`). Filled on load.
    #[serde(default)]
    pub category: String,
    /// Key within the category (e.g. `"1.2"`). Filled on load.
    #[serde(default)]
    pub key: String,
    /// Policy title.
    pub title: String,
    /// Full policy text.
    pub text: String,
}

impl Policy {
    /// The `"{category}.{key}"` path identifying this policy.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}", self.category, self.key)
    }

    /// Lower-cased text that keyword search matches against.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        format!("{} {} {}", self.title, self.text, self.category).to_lowercase()
    }
}

/// Everything the plan says about a single coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    /// The queried point.
    pub coordinates: Coordinates,
    /// Whether the point is inside the municipal boundary.
    pub within_boundary: bool,
    /// How the boundary answer was obtained.
    pub boundary_precision: BoundaryPrecision,
    /// Applicable land-use designation.
    pub land_use: Option<LandUseDesignation>,
    /// Applicable zoning district.
    pub zoning: Option<ZoningDistrict>,
    /// Policies shown alongside the designation.
    pub policies: Vec<Policy>,
}

/// Discriminant of a [`ResultItem`], used for deduplication.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResultKind {
    /// A land-use designation.
    LandUse,
    /// A zoning district.
    Zoning,
    /// A policy.
    Policy,
    /// The designation at the supplied location.
    LocationSpecific,
    /// The AI answer text.
    AiAnswer,
    /// A designation mentioned by the AI answer.
    AiMentioned,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResultItem {
    /// Keyword or category match on a land-use designation.
    #[serde(rename_all = "camelCase")]
    LandUse {
        /// The matched designation.
        designation: LandUseDesignation,
        /// Why it matched.
        match_reason: String,
    },
    /// Keyword or height match on a zoning district.
    #[serde(rename_all = "camelCase")]
    Zoning {
        /// The matched district.
        district: ZoningDistrict,
        /// Why it matched.
        match_reason: String,
    },
    /// Keyword match on a policy.
    #[serde(rename_all = "camelCase")]
    Policy {
        /// The matched policy.
        policy: Policy,
        /// Why it matched.
        match_reason: String,
    },
    /// The designation that applies at the location supplied with the query.
    #[serde(rename_all = "camelCase")]
    LocationSpecific {
        /// The supplied location.
        coordinates: Coordinates,
        /// Designation at that location.
        designation: LandUseDesignation,
        /// Zoning at that location.
        zoning: Option<ZoningDistrict>,
        /// Why it is shown.
        match_reason: String,
    },
    /// The free-text answer returned by the AI proxy.
    #[serde(rename_all = "camelCase")]
    AiAnswer {
        /// Answer text.
        answer: String,
        /// Model-reported confidence in `0.0..=1.0`.
        confidence: f64,
        /// Why it is shown.
        match_reason: String,
    },
    /// A designation code mentioned in the AI answer.
    #[serde(rename_all = "camelCase")]
    AiMentioned {
        /// The mentioned designation.
        designation: LandUseDesignation,
        /// Why it is shown.
        match_reason: String,
    },
}

impl ResultItem {
    /// The discriminant of this item.
    #[must_use]
    pub const fn kind(&self) -> ResultKind {
        match self {
            Self::LandUse { .. } => ResultKind::LandUse,
            Self::Zoning { .. } => ResultKind::Zoning,
            Self::Policy { .. } => ResultKind::Policy,
            Self::LocationSpecific { .. } => ResultKind::LocationSpecific,
            Self::AiAnswer { .. } => ResultKind::AiAnswer,
            Self::AiMentioned { .. } => ResultKind::AiMentioned,
        }
    }

    /// Identifying code (or name/path where there is no code).
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Self::LandUse { designation, .. }
            | Self::LocationSpecific { designation, .. }
            | Self::AiMentioned { designation, .. } => designation.code.clone(),
            Self::Zoning { district, .. } => district.code.clone(),
            Self::Policy { policy, .. } => policy.path(),
            Self::AiAnswer { .. } => "ai-answer".to_string(),
        }
    }

    /// Display name of the matched entity.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::LandUse { designation, .. }
            | Self::LocationSpecific { designation, .. }
            | Self::AiMentioned { designation, .. } => &designation.name,
            Self::Zoning { district, .. } => &district.name,
            Self::Policy { policy, .. } => &policy.title,
            Self::AiAnswer { .. } => "AI answer",
        }
    }

    /// Composite `(kind, identifier)` key used to drop duplicate hits.
    #[must_use]
    pub fn dedup_key(&self) -> (ResultKind, String) {
        (self.kind(), self.identifier())
    }

    /// Human-readable reason this item is in the results.
    #[must_use]
    pub fn match_reason(&self) -> &str {
        match self {
            Self::LandUse { match_reason, .. }
            | Self::Zoning { match_reason, .. }
            | Self::Policy { match_reason, .. }
            | Self::LocationSpecific { match_reason, .. }
            | Self::AiAnswer { match_reason, .. }
            | Self::AiMentioned { match_reason, .. } => match_reason,
        }
    }
}

/// How a [`SearchResult`] was produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SearchMethod {
    /// Local keyword/category/height search.
    Local,
    /// AI proxy answer.
    Ai,
    /// The search failed; see [`SearchResult::error`].
    Error,
    /// Nothing to search for.
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    Empty,
    /// The plan data has not finished loading.
    NotReady,
}

/// The envelope returned for every search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Deduplicated hits, capped at the requested maximum.
    pub results: Vec<ResultItem>,
    /// How the results were produced.
    pub method: SearchMethod,
    /// Raw AI answer text, for AI results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
    /// AI-reported confidence, for AI results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Citations returned with an AI answer.
    #[serde(default)]
    pub citations: Vec<String>,
    /// Whether local results were served because the AI path failed.
    #[serde(default)]
    pub fallback: bool,
    /// The AI failure that triggered a fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
    /// Error message for `error`/`none`/`not-ready` results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
}

impl SearchResult {
    fn with_method(method: SearchMethod, results: Vec<ResultItem>) -> Self {
        Self {
            results,
            method,
            ai_response: None,
            confidence: None,
            citations: Vec::new(),
            fallback: false,
            ai_error: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// A successful local search.
    #[must_use]
    pub fn local(results: Vec<ResultItem>) -> Self {
        Self::with_method(SearchMethod::Local, results)
    }

    /// Local results served after the AI path failed with `ai_error`.
    #[must_use]
    pub fn fallback(results: Vec<ResultItem>, ai_error: impl Into<String>) -> Self {
        Self {
            fallback: true,
            ai_error: Some(ai_error.into()),
            ..Self::local(results)
        }
    }

    /// A successful AI search.
    #[must_use]
    pub fn ai(
        results: Vec<ResultItem>,
        answer: String,
        confidence: f64,
        citations: Vec<String>,
    ) -> Self {
        Self {
            ai_response: Some(answer),
            confidence: Some(confidence),
            citations,
            ..Self::with_method(SearchMethod::Ai, results)
        }
    }

    /// The query was empty after normalization.
    #[must_use]
    pub fn empty_query() -> Self {
        Self {
            error: Some("Empty query".to_string()),
            ..Self::with_method(SearchMethod::Empty, Vec::new())
        }
    }

    /// The plan data is not loaded yet.
    #[must_use]
    pub fn not_ready() -> Self {
        Self {
            error: Some("Plan data is not loaded".to_string()),
            ..Self::with_method(SearchMethod::NotReady, Vec::new())
        }
    }

    /// The search failed with `message`.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::with_method(SearchMethod::Error, Vec::new())
        }
    }
}

/// Converts `value` in `unit` (one of [`HEIGHT_UNIT_PATTERN`]) to metres.
/// Storeys and floors convert at [`STOREY_HEIGHT_METRES`]; anything else
/// is taken as metres.
#[must_use]
pub fn height_unit_to_metres(value: f64, unit: &str) -> f64 {
    let unit = unit.to_ascii_lowercase();
    if unit.starts_with("stor") || unit.starts_with("floor") {
        value * STOREY_HEIGHT_METRES
    } else {
        value
    }
}

/// Parses a height such as `"12m"`, `"12.5 metres"` or `"4 storeys"` into
/// metres. A bare number is taken as metres.
#[must_use]
pub fn parse_height_metres(value: &str) -> Option<f64> {
    let caps = HEIGHT_VALUE_RE.captures(value)?;
    let number: f64 = caps[1].parse().ok()?;
    Some(caps.get(2).map_or(number, |unit| {
        height_unit_to_metres(number, unit.as_str())
    }))
}
