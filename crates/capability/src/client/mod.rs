//! Client for OpenAI-compatible chat completion endpoints

mod types;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, warn};

pub use types::{ChatMessage, ChatRequest, Role};
use types::{ApiErrorResponse, ChatCompletionBody, ChatCompletionResponse};

use crate::error::{CapabilityError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ChatClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Single-shot chat completion client. Performs exactly one HTTP request
/// per call; retrying is left to the caller.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CapabilityError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one completion request and return the first choice's content.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CapabilityError::Unavailable("no API key configured".to_string()))?;

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            json_mode = request.json_mode,
            "Creating chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&ChatCompletionBody::from(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                error!(
                    status = status.as_u16(),
                    error_type = ?error_resp.error.error_type,
                    "Chat completion error: {}",
                    error_resp.error.message
                );
                return Err(CapabilityError::Remote {
                    status: Some(status.as_u16()),
                    message: error_resp.error.message,
                });
            }

            warn!(status = status.as_u16(), "Chat completion failed");
            return Err(CapabilityError::Remote {
                status: Some(status.as_u16()),
                message: error_text,
            });
        }

        let body = response.text().await?;
        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CapabilityError::MalformedResponse(format!("completion body: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| CapabilityError::MalformedResponse("empty completion".to_string()))
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
