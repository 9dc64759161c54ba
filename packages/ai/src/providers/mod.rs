//! LLM provider abstraction and implementations.
//!
//! The proxy endpoint makes a single completion call per question, so the
//! trait is a plain system-prompt + user-prompt exchange.

pub mod anthropic;
pub mod openai;

use serde::Deserialize;

use crate::AiError;

/// Output cap for one answer.
const MAX_TOKENS: u32 = 1024;

/// Sampling temperature. Plan answers should stay close to the context.
const ANSWER_TEMPERATURE: f32 = 0.2;

/// Error body shape shared by the Anthropic and `OpenAI` APIs.
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Maps a non-success provider response to [`AiError::Provider`], using the
/// API's own error message when the body carries one.
fn provider_error(status: reqwest::StatusCode, body: &str) -> AiError {
    let message = serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
        |b| b.error.message,
    );
    AiError::Provider { message }
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends one completion request and returns the model's text.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError>;
}

/// Creates an LLM provider based on environment variables.
///
/// If `AI_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 2. `OPENAI_API_KEY` or `AI_BASE_URL` set -> `OpenAI`-compatible
///
/// # Errors
///
/// Returns [`AiError::Config`] if no credentials are found or the
/// explicitly requested provider is not configured.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| detect_provider());

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = std::env::var("AI_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(api_key, model)))
        }
        "openai" | "gpt" => {
            let base_url = std::env::var("AI_BASE_URL").ok();
            let api_key = match (std::env::var("OPENAI_API_KEY"), &base_url) {
                (Ok(key), _) => key,
                // Local OpenAI-compatible servers usually take no key.
                (Err(_), Some(_)) => String::new(),
                (Err(_), None) => {
                    return Err(AiError::Config {
                        message: "OPENAI_API_KEY environment variable not set".to_string(),
                    });
                }
            };
            let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
            let provider = openai::OpenAiProvider::new(api_key, model);
            Ok(Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            }))
        }
        other => Err(AiError::Config {
            message: format!("Unknown AI provider: {other}. Use 'anthropic' or 'openai'."),
        }),
    }
}

/// Auto-detects which provider to use based on available credentials.
fn detect_provider() -> String {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
        return "anthropic".to_string();
    }

    if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("AI_BASE_URL").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI-compatible");
        return "openai".to_string();
    }

    log::warn!(
        "No AI credentials detected. Set ANTHROPIC_API_KEY, OPENAI_API_KEY or \
         AI_BASE_URL. You can also set AI_PROVIDER explicitly."
    );

    // Anthropic then reports the missing key.
    "anthropic".to_string()
}
