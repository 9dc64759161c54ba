//! Client side of the AI proxy contract.

use std::time::Duration;

use ocp_explorer_ai_models::{ApiErrorBody, AskRequest, AskResponse};

use crate::AiError;

/// Sends questions to the AI proxy.
#[async_trait::async_trait]
pub trait AiProxy: Send + Sync {
    /// Sends one question and waits for the answer.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] on transport failure, timeout, any non-200
    /// status, or a body that does not match [`AskResponse`].
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, AiError>;
}

/// [`AiProxy`] over HTTP `POST` with a JSON body.
pub struct HttpAiProxy {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpAiProxy {
    /// Creates a client posting to `url`, failing requests that take longer
    /// than `timeout`.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl AiProxy for HttpAiProxy {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, AiError> {
        log::debug!("Posting question to AI proxy at {}", self.url);

        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = resp.text().await.map_err(|e| self.map_transport(e))?;

        if status != reqwest::StatusCode::OK {
            return Err(status_error(status.as_u16(), &body, retry_after));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl HttpAiProxy {
    fn map_transport(&self, e: reqwest::Error) -> AiError {
        if e.is_timeout() {
            AiError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            AiError::Http(e)
        }
    }
}

/// Builds the error for a non-200 response, preferring the proxy's own
/// error message when the body is an [`ApiErrorBody`].
fn status_error(status: u16, body: &str, retry_after: Option<u64>) -> AiError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let retry_after = retry_after.or_else(|| parsed.as_ref().and_then(|b| b.retry_after));
    let message = parsed.map_or_else(|| body.chars().take(200).collect(), |b| b.error);

    AiError::Status {
        status,
        message,
        retry_after,
    }
}
