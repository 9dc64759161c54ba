//! In-process [`AiProxy`] for the server's own search orchestrator.
//!
//! Searches made through `/api/search` reach the configured provider
//! directly instead of posting back to this server's `/api/ask`, so the
//! `/api/ask` limiter only ever sees real clients.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ocp_explorer_ai::AiError;
use ocp_explorer_ai::providers::LlmProvider;
use ocp_explorer_ai::proxy::AiProxy;
use ocp_explorer_ai_models::{AskRequest, AskResponse, validate_question};

use crate::prompt::{build_system_prompt, parse_reply};

/// Builds the plan-grounded prompt for `request`, calls `provider` with the
/// already validated `question` and turns the reply into an [`AskResponse`].
///
/// # Errors
///
/// Returns the provider's [`AiError`] if the completion request fails.
pub async fn answer(
    provider: &dyn LlmProvider,
    request: &AskRequest,
    question: &str,
) -> Result<AskResponse, AiError> {
    let system_prompt = build_system_prompt(&request.context, request.location);
    let text = provider.complete(&system_prompt, question).await?;

    let reply = parse_reply(&text, &request.context);
    Ok(AskResponse {
        answer: reply.answer,
        confidence: reply.confidence,
        mentioned_areas: reply.mentioned_areas,
        mentioned_policies: reply.mentioned_policies,
        citations: reply.citations,
        timestamp: Utc::now().timestamp_millis(),
        query: question.to_string(),
    })
}

/// [`AiProxy`] that calls an [`LlmProvider`] in the same process.
pub struct ProviderProxy {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl ProviderProxy {
    /// Creates a proxy over `provider` that gives up after `timeout`. With
    /// `None` every question fails with [`AiError::Config`] and searches
    /// fall back to local results.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait::async_trait]
impl AiProxy for ProviderProxy {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, AiError> {
        let question = validate_question(&request.question).map_err(|e| AiError::Provider {
            message: e.to_string(),
        })?;

        let Some(provider) = self.provider.as_deref() else {
            return Err(AiError::Config {
                message: "AI service is not configured".to_string(),
            });
        };

        actix_web::rt::time::timeout(self.timeout, answer(provider, request, question))
            .await
            .map_err(|_| AiError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
    }
}
