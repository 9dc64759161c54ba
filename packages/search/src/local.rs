//! Keyword, category and height-range search over the plan tables.
//!
//! Matching is a plain OR of substrings with no relevance ranking. Hits come
//! out in table order, with the location-specific hit (if any) first, then
//! keyword hits, category hits and height hits. Duplicates are dropped by
//! `(kind, identifier)`, keeping the first occurrence.

use std::collections::HashSet;
use std::sync::Arc;

use ocp_explorer_data::PlanRepository;
use ocp_explorer_location::LocationResolver;
use ocp_explorer_plan_models::{Coordinates, LandUseCategory, ResultItem};

use crate::height::{HeightRange, parse_height_range};
use crate::normalize::{normalize_query, tokenize};

/// Results contributed by each category a query mentions.
const CATEGORY_RESULTS: usize = 2;

/// Words that map a query onto a land-use category.
const CATEGORY_KEYWORDS: &[(&str, LandUseCategory)] = &[
    ("residential", LandUseCategory::Residential),
    ("housing", LandUseCategory::Residential),
    ("homes", LandUseCategory::Residential),
    ("apartments", LandUseCategory::Residential),
    ("commercial", LandUseCategory::Commercial),
    ("retail", LandUseCategory::Commercial),
    ("shops", LandUseCategory::Commercial),
    ("shopping", LandUseCategory::Commercial),
    ("mixed-use", LandUseCategory::MixedUse),
    ("mixed use", LandUseCategory::MixedUse),
    ("employment", LandUseCategory::Employment),
    ("industrial", LandUseCategory::Employment),
    ("jobs", LandUseCategory::Employment),
    ("environmental", LandUseCategory::Environmental),
    ("parks", LandUseCategory::Environmental),
    ("green", LandUseCategory::Environmental),
    ("institutional", LandUseCategory::Institutional),
    ("schools", LandUseCategory::Institutional),
    ("hospital", LandUseCategory::Institutional),
];

/// Tokens too common to be useful as substring keywords.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "for", "how", "i", "in", "is", "it", "of", "on", "or",
    "the", "to", "what", "where", "which", "with",
];

/// Searches the plan tables without calling out to the AI proxy.
pub struct LocalSearchEngine {
    resolver: Arc<LocationResolver>,
}

impl LocalSearchEngine {
    /// Creates an engine reading through `resolver`.
    #[must_use]
    pub const fn new(resolver: Arc<LocationResolver>) -> Self {
        Self { resolver }
    }

    fn repository(&self) -> &PlanRepository {
        self.resolver.repository()
    }

    /// Runs a full local search, returning at most `max_results` hits.
    ///
    /// Returns an empty list for an empty query or before the plan data is
    /// loaded.
    #[must_use]
    pub fn search(
        &self,
        query: &str,
        location: Option<Coordinates>,
        max_results: usize,
    ) -> Vec<ResultItem> {
        let mut items = Vec::new();

        if let Some(coordinates) = location {
            let info = self.resolver.resolve(coordinates.lat, coordinates.lng);
            if let Some(designation) = info.land_use {
                items.push(ResultItem::LocationSpecific {
                    coordinates,
                    designation,
                    zoning: info.zoning,
                    match_reason: "Designation at this location".to_string(),
                });
            }
        }

        items.extend(self.search_by_keywords(query));
        items.extend(self.search_by_categories(query));
        items.extend(self.search_by_height(query));

        let mut items = dedup(items);
        items.truncate(max_results);
        log::debug!("Local search for {query:?} produced {} results", items.len());
        items
    }

    /// Every designation, zone and policy whose searchable text contains any
    /// query token.
    #[must_use]
    pub fn search_by_keywords(&self, query: &str) -> Vec<ResultItem> {
        let tokens: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| !STOP_WORDS.contains(&t.as_str()))
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let first_match = |text: &str| {
            tokens
                .iter()
                .find(|t| text.contains(t.as_str()))
                .map(|t| format!("Matches keyword: {t}"))
        };

        let repository = self.repository();
        let mut items = Vec::new();

        for designation in repository.land_uses() {
            if let Some(reason) = first_match(&designation.searchable_text()) {
                items.push(ResultItem::LandUse {
                    designation: designation.clone(),
                    match_reason: reason,
                });
            }
        }
        for district in repository.zoning_districts() {
            if let Some(reason) = first_match(&district.searchable_text()) {
                items.push(ResultItem::Zoning {
                    district: district.clone(),
                    match_reason: reason,
                });
            }
        }
        for policy in repository.policies() {
            if let Some(reason) = first_match(&policy.searchable_text()) {
                items.push(ResultItem::Policy {
                    policy: policy.clone(),
                    match_reason: reason,
                });
            }
        }

        dedup(items)
    }

    /// Up to two designations for every category the query mentions.
    #[must_use]
    pub fn search_by_categories(&self, query: &str) -> Vec<ResultItem> {
        let repository = self.repository();
        detect_categories(query)
            .into_iter()
            .flat_map(|category| {
                repository
                    .search_by_category(category)
                    .into_iter()
                    .take(CATEGORY_RESULTS)
                    .map(move |designation| ResultItem::LandUse {
                        designation: designation.clone(),
                        match_reason: format!("Matches category: {category}"),
                    })
            })
            .collect()
    }

    /// Zoning districts whose maximum height falls in the range the query
    /// asks for. Empty when the query has no height phrase.
    #[must_use]
    pub fn search_by_height(&self, query: &str) -> Vec<ResultItem> {
        parse_height_range(query).map_or_else(Vec::new, |range| self.zones_in_range(range))
    }

    fn zones_in_range(&self, range: HeightRange) -> Vec<ResultItem> {
        self.repository()
            .zoning_districts()
            .filter_map(|district| {
                let metres = district.max_height_metres()?;
                range.contains(metres).then(|| ResultItem::Zoning {
                    district: district.clone(),
                    match_reason: format!("Maximum height {metres}m is {range}"),
                })
            })
            .collect()
    }
}

/// Categories named by the query, in keyword-table order, without repeats.
fn detect_categories(query: &str) -> Vec<LandUseCategory> {
    let normalized = normalize_query(query);
    let tokens: Vec<&str> = normalized.split(' ').collect();

    let mut categories = Vec::new();
    for (keyword, category) in CATEGORY_KEYWORDS {
        let hit = if keyword.contains(' ') {
            normalized.contains(keyword)
        } else {
            tokens.contains(keyword)
        };
        if hit && !categories.contains(category) {
            categories.push(*category);
        }
    }
    categories
}

/// Drops items whose `(kind, identifier)` was already seen.
pub(crate) fn dedup(items: Vec<ResultItem>) -> Vec<ResultItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.dedup_key()))
        .collect()
}
