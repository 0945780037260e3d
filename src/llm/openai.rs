//! OpenAI LLM client implementation.
//!
//! Implements the LlmClient trait for OpenAI's chat completions API and any
//! server that speaks the same protocol.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GenvizError, Result};
use crate::http::{self, HttpFailure};
use crate::llm::types::Message;
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OpenAI API base URL.
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Model used when none is configured.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o", "gpt-4o-mini").
    pub model: String,
    /// Base URL of the API, without the endpoint path.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Points the client at an OpenAI-compatible server.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// OpenAI LLM client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new OpenAI client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs))
            .map_err(|e| GenvizError::translation(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Converts internal messages to OpenAI API format.
    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Maps a failed exchange to a translation error.
    fn map_failure(failure: HttpFailure) -> GenvizError {
        match failure {
            HttpFailure::Status { status, .. } if status == StatusCode::UNAUTHORIZED => {
                GenvizError::translation("Authentication failed. Check your OPENAI_API_KEY.")
            }
            HttpFailure::Status { status, .. } if status == StatusCode::TOO_MANY_REQUESTS => {
                GenvizError::translation("Rate limited. Please wait and try again.")
            }
            HttpFailure::Status { status, body } => {
                match serde_json::from_str::<OpenAiErrorResponse>(&body) {
                    Ok(error_response) => GenvizError::translation(format!(
                        "OpenAI API error: {}",
                        error_response.error.message
                    )),
                    Err(_) => GenvizError::translation(format!("OpenAI API error ({status}): {body}")),
                }
            }
            HttpFailure::Timeout => GenvizError::translation("Request timed out. Try again."),
            HttpFailure::Connect => {
                GenvizError::translation("Failed to connect to OpenAI API. Check your network.")
            }
            HttpFailure::Request(message) => {
                GenvizError::translation(format!("Request failed: {message}"))
            }
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: 0.0,
        };
        let url = self.completions_url();

        let body = http::send_with_retry("OpenAI", || {
            self.client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&request)
        })
        .await
        .map_err(Self::map_failure)?;

        let response: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|e| GenvizError::translation(format!("Failed to parse response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenvizError::translation("No response from OpenAI"))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
