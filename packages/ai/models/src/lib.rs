#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and response types for the AI proxy endpoint.
//!
//! The explorer's search orchestrator sends an [`AskRequest`] carrying the
//! user's question plus a [`ProxyContext`] sampled from the local plan
//! data; the proxy answers with an [`AskResponse`]. Both sides share
//! [`validate_question`] so input is screened identically before it leaves
//! the client and when it reaches the server.

use std::sync::LazyLock;

use ocp_explorer_plan_models::Coordinates;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum question length accepted by the proxy, in characters.
pub const MIN_QUESTION_CHARS: usize = 3;

/// Maximum question length, in characters.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Markup and script fragments never accepted in a question.
static DISALLOWED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<\s*script|<\s*iframe|javascript\s*:|vbscript\s*:|data\s*:\s*text/html|\bon[a-z]+\s*=|eval\s*\(",
    )
    .expect("valid regex")
});

/// Why a question was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// Fewer than [`MIN_QUESTION_CHARS`] characters after trimming.
    #[error("Question must be at least {min} characters")]
    TooShort {
        /// The minimum.
        min: usize,
    },
    /// More than [`MAX_QUESTION_CHARS`] characters after trimming.
    #[error("Question must be at most {max} characters (got {len})")]
    TooLong {
        /// The maximum.
        max: usize,
        /// The actual length.
        len: usize,
    },
    /// Contains a script-injection fragment.
    #[error("Question contains disallowed content")]
    Disallowed,
}

/// Checks the upper length bound and the disallowed fragments.
///
/// # Errors
///
/// Returns [`QuestionError::TooLong`] or [`QuestionError::Disallowed`].
pub fn screen_question(question: &str) -> Result<(), QuestionError> {
    let len = question.trim().chars().count();
    if len > MAX_QUESTION_CHARS {
        return Err(QuestionError::TooLong {
            max: MAX_QUESTION_CHARS,
            len,
        });
    }
    if DISALLOWED_RE.is_match(question) {
        return Err(QuestionError::Disallowed);
    }
    Ok(())
}

/// Full proxy validation: length in `3..=500` characters after trimming
/// and no disallowed fragments. Returns the trimmed question.
///
/// # Errors
///
/// Returns the first [`QuestionError`] that applies.
pub fn validate_question(question: &str) -> Result<&str, QuestionError> {
    let trimmed = question.trim();
    if trimmed.chars().count() < MIN_QUESTION_CHARS {
        return Err(QuestionError::TooShort {
            min: MIN_QUESTION_CHARS,
        });
    }
    screen_question(trimmed)?;
    Ok(trimmed)
}

/// A designation code and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignationSample {
    /// Designation code.
    pub code: String,
    /// Designation name.
    pub name: String,
}

/// The designations in one land-use category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySample {
    /// Category name (`kebab-case`).
    pub category: String,
    /// Designations in the category.
    pub designations: Vec<DesignationSample>,
}

/// A policy path and title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySample {
    /// `"{category}.{key}"` path.
    pub path: String,
    /// Policy title.
    pub title: String,
}

/// A local keyword hit passed to the model as grounding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMatch {
    /// Result type (`land-use`, `zoning`, `policy`).
    pub kind: String,
    /// Code or policy path.
    pub id: String,
    /// Name or title.
    pub name: String,
}

/// Plan data sampled by the client to ground the model's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyContext {
    /// Municipality name.
    pub plan_name: String,
    /// Designations grouped by land-use category.
    pub categories: Vec<CategorySample>,
    /// Every land-use designation code.
    pub land_use_codes: Vec<String>,
    /// A few policies per policy category.
    pub policy_samples: Vec<PolicySample>,
    /// Up to five local keyword hits for the question.
    pub local_matches: Vec<LocalMatch>,
}

/// `POST /api/ask` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// The user's question.
    pub question: String,
    /// Grounding context.
    #[serde(default)]
    pub context: ProxyContext,
    /// Location the question is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
}

/// `POST /api/ask` success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    /// Answer text.
    pub answer: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Land-use designation codes mentioned in the answer.
    #[serde(default)]
    pub mentioned_areas: Vec<String>,
    /// Policy numbers mentioned in the answer.
    #[serde(default)]
    pub mentioned_policies: Vec<String>,
    /// Sources cited by the answer.
    #[serde(default)]
    pub citations: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// The question that was answered.
    pub query: String,
}

/// Error body for every non-200 proxy response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Error description.
    pub error: String,
    /// Seconds until the caller may retry, for `429`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
