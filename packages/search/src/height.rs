//! Height-range phrases: "over N", "under N" and "between N and M",
//! with a unit of storeys, floors or metres.

use std::fmt;
use std::sync::LazyLock;

use ocp_explorer_plan_models::{HEIGHT_UNIT_PATTERN, height_unit_to_metres};
use regex::Regex;

const NUMBER: &str = r"(\d+(?:\.\d+)?)";

/// The first unit of a "between" phrase is optional.
static BETWEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bbetween\s+{NUMBER}\s*(?:({HEIGHT_UNIT_PATTERN})\b)?\s+(?:and|to)\s+{NUMBER}\s*({HEIGHT_UNIT_PATTERN})\b"
    ))
    .expect("valid regex")
});

static OVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:over|above|more than|taller than|greater than)\s+{NUMBER}\s*({HEIGHT_UNIT_PATTERN})\b"
    ))
    .expect("valid regex")
});

static UNDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:under|below|less than|shorter than|up to)\s+{NUMBER}\s*({HEIGHT_UNIT_PATTERN})\b"
    ))
    .expect("valid regex")
});

/// A height range in metres. `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightRange {
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
}

impl HeightRange {
    /// Whether `metres` falls in the range.
    #[must_use]
    pub fn contains(&self, metres: f64) -> bool {
        self.min.is_none_or(|min| metres >= min) && self.max.is_none_or(|max| metres <= max)
    }
}

impl fmt::Display for HeightRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "between {min}m and {max}m"),
            (Some(min), None) => write!(f, "over {min}m"),
            (None, Some(max)) => write!(f, "under {max}m"),
            (None, None) => write!(f, "any height"),
        }
    }
}

/// Extracts a height range from a query, if it contains one.
#[must_use]
pub fn parse_height_range(query: &str) -> Option<HeightRange> {
    let query = query.to_lowercase();

    if let Some(caps) = BETWEEN_RE.captures(&query) {
        let unit = &caps[4];
        let first_unit = caps.get(2).map_or(unit, |m| m.as_str());
        let a = height_unit_to_metres(caps[1].parse().ok()?, first_unit);
        let b = height_unit_to_metres(caps[3].parse().ok()?, unit);
        return Some(HeightRange {
            min: Some(a.min(b)),
            max: Some(a.max(b)),
        });
    }

    if let Some(caps) = OVER_RE.captures(&query) {
        return Some(HeightRange {
            min: Some(height_unit_to_metres(caps[1].parse().ok()?, &caps[2])),
            max: None,
        });
    }

    if let Some(caps) = UNDER_RE.captures(&query) {
        return Some(HeightRange {
            min: None,
            max: Some(height_unit_to_metres(caps[1].parse().ok()?, &caps[2])),
        });
    }

    None
}
