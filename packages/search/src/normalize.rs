//! Query normalization.
//!
//! Applied once per search before caching and dispatch, and again by the
//! local engine before tokenizing.

use regex::Regex;
use std::sync::LazyLock;

/// Characters other than word characters, whitespace, hyphens and
/// apostrophes.
static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s'\-]+").expect("valid regex"));

/// Normalizes a search query.
///
/// The pipeline:
/// 1. Trim
/// 2. Strip characters outside word/space/hyphen/apostrophe
/// 3. Collapse whitespace
/// 4. Lowercase
#[must_use]
pub fn normalize_query(query: &str) -> String {
    let stripped = STRIP_RE.replace_all(query.trim(), "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Splits a query into normalized whitespace-separated tokens.
#[must_use]
pub fn tokenize(query: &str) -> Vec<String> {
    normalize_query(query)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
