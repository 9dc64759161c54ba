#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AI access for the OCP explorer.
//!
//! Two seams live here:
//!
//! - [`proxy::AiProxy`] is what the search orchestrator calls: one JSON
//!   request/response exchange with the AI proxy endpoint.
//! - [`providers::LlmProvider`] is what the proxy endpoint itself calls to
//!   reach a hosted model. Anthropic Claude and any `OpenAI`-compatible
//!   server (selected with `AI_PROVIDER` / `AI_BASE_URL`) are supported.

pub mod providers;
pub mod proxy;

use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The proxy answered with a non-200 status.
    #[error("AI proxy returned HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Error text from the response body.
        message: String,
        /// `Retry-After` seconds, when the proxy sent one.
        retry_after: Option<u64>,
    },

    /// The request did not complete within the configured timeout.
    #[error("AI request timed out after {seconds}s")]
    Timeout {
        /// The configured timeout.
        seconds: u64,
    },

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}
