//! Anthropic Claude provider implementation.

use serde::{Deserialize, Serialize};

use super::{ANSWER_TEMPERATURE, LlmProvider, MAX_TOKENS, provider_error};
use crate::AiError;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude API provider.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

/// Messages API request: a single user turn under a system prompt.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// Only text blocks carry the answer; anything else is skipped.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: ANSWER_TEMPERATURE,
            system: system_prompt,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };

        log::debug!("Sending completion request to Anthropic model {}", self.model);
        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<String, AiError> {
    let response: MessagesResponse = serde_json::from_str(body)?;
    let text: Vec<String> = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();

    if text.is_empty() {
        return Err(AiError::Provider {
            message: "Anthropic response contained no text".to_string(),
        });
    }

    Ok(text.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks() {
        let body = r#"{"content":[{"type":"text","text":"one"},{"type":"tool_use","id":"x","name":"y","input":{}},{"type":"text","text":"two"}]}"#;
        assert_eq!(parse_response(body).unwrap(), "one\ntwo");
    }

    #[test]
    fn empty_content_is_an_error() {
        assert!(matches!(
            parse_response(r#"{"content":[]}"#),
            Err(AiError::Provider { .. })
        ));
    }
}
