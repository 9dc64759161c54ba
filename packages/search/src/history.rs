//! Recent searches and the suggestions built from them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use ocp_explorer_plan_models::SearchMethod;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_query;

/// Suggestions offered even before anything has been searched.
const CANNED_TERMS: &[&str] = &[
    "residential",
    "mixed use",
    "commercial",
    "industrial",
    "parks",
    "housing policy",
    "rental housing",
    "townhouses",
    "laneway houses",
    "over 10 storeys",
    "under 20m",
    "transit-oriented growth",
    "employment lands",
    "building height",
];

/// Shortest partial query that produces suggestions.
const MIN_SUGGESTION_CHARS: usize = 2;

/// One completed search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The query as entered.
    pub query: String,
    /// How it was answered.
    pub method: SearchMethod,
    /// When it completed.
    pub timestamp: DateTime<Utc>,
}

/// Bounded most-recent-first list of searches.
#[derive(Debug)]
pub struct SearchHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl SearchHistory {
    /// Creates an empty history keeping at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a search, dropping the oldest entries past capacity.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Up to `limit` completions for `partial`: past queries first (most
    /// recent first), then canned terms, each containing `partial`.
    #[must_use]
    pub fn suggestions(&self, partial: &str, limit: usize) -> Vec<String> {
        let partial = normalize_query(partial);
        if partial.chars().count() < MIN_SUGGESTION_CHARS {
            return Vec::new();
        }

        let mut suggestions: Vec<String> = Vec::new();
        let candidates = self
            .entries
            .iter()
            .map(|e| e.query.trim().to_string())
            .chain(CANNED_TERMS.iter().map(|t| (*t).to_string()));

        for candidate in candidates {
            if suggestions.len() >= limit {
                break;
            }
            let lowered = candidate.to_lowercase();
            if lowered.contains(&partial) && !suggestions.iter().any(|s| s.to_lowercase() == lowered)
            {
                suggestions.push(candidate);
            }
        }

        suggestions
    }
}
