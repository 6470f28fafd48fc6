// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chat completion client for the hosted AI gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// Default gateway base URL.
pub const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
/// Default model.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Errors from the completion gateway.
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key configured.
    #[error("API key not configured")]
    MissingApiKey,

    /// Gateway answered 429.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Gateway answered 402.
    #[error("payment required")]
    PaymentRequired,

    /// Gateway answered another non-success status.
    #[error("gateway returned {status}: {body}")]
    Upstream {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request could not be sent or timed out.
    #[error("request failed: {0}")]
    Request(String),

    /// The response was not a chat completion.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Produces a completion for a conversation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Whether credentials are present.
    fn is_configured(&self) -> bool {
        true
    }

    /// Return the first choice's content, empty if the model sent none.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, AiError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl GatewayClient {
    /// Create a client. A missing key fails each call, not construction.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for GatewayClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        debug!(model = %self.model, messages = messages.len(), "calling completion gateway");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "completion gateway error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => AiError::PaymentRequired,
                _ => AiError::Upstream {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AiError::Decode(e.to_string()))?;
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}
