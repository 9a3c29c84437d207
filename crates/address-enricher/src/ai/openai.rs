//! OpenAI chat-completions provider implementation.
//!
//! This module provides the [`OpenAiExtractor`] which implements the
//! [`AddressExtractor`] trait for any OpenAI-compatible chat-completions
//! endpoint (<https://platform.openai.com/docs/api-reference/chat>).

use super::AddressExtractor;
use super::prompt::{SYSTEM_PROMPT, build_user_prompt, parse_extraction};
use crate::error::{EnrichmentError, Result};
use crate::types::{AddressRecord, EnrichmentItem};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default chat-completions endpoint.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model used for extraction.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default temperature (low for deterministic outputs).
const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Upper bound on how much of an error body is kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Configuration for the OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// The model to use (e.g., "gpt-4o-mini").
    pub model: String,
    /// Temperature for response generation (0.0 - 2.0).
    pub temperature: f32,
    /// Optional cap on response tokens.
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Endpoint URL (useful for proxies or compatible services).
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl OpenAiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> OpenAiConfigBuilder {
        OpenAiConfigBuilder::default()
    }
}

/// Builder for [`OpenAiConfig`].
#[derive(Default)]
pub struct OpenAiConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl OpenAiConfigBuilder {
    /// Set the model to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature (0.0 - 2.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the number of response tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Set a custom endpoint URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenAiConfig {
        OpenAiConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

/// Address extractor backed by an OpenAI-compatible chat endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use address_enricher::ai::{OpenAiConfig, OpenAiExtractor};
///
/// let extractor = OpenAiExtractor::new("sk-...")?;
///
/// let config = OpenAiConfig::builder().model("gpt-4o").timeout_secs(30).build();
/// let extractor = OpenAiExtractor::with_config("sk-...", config)?;
/// ```
pub struct OpenAiExtractor {
    api_key: String,
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiExtractor {
    /// Create a new provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is blank or the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, OpenAiConfig::default())
    }

    /// Create a new provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is blank or the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: OpenAiConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EnrichmentError::MissingCredential);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EnrichmentError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            config,
            client,
        })
    }

    fn build_request(&self, records: &[AddressRecord]) -> Result<ChatRequest> {
        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(records)?,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        })
    }

    fn call_api(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("Unknown status");
            warn!("Extraction API returned {}", status);
            return Err(EnrichmentError::Upstream {
                status: status.as_u16(),
                message: upstream_message(reason, &body),
            });
        }

        let result: ChatResponse = response
            .json()
            .map_err(|e| EnrichmentError::MalformedResponse(format!("undecodable body: {}", e)))?;

        extract_content(result)
    }
}

fn upstream_message(reason: &str, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return reason.to_string();
    }
    let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{} ({})", reason, snippet)
}

fn extract_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| {
            EnrichmentError::MalformedResponse("no message content in response".to_string())
        })
}

impl AddressExtractor for OpenAiExtractor {
    fn extract(&self, records: &[AddressRecord]) -> Result<Vec<EnrichmentItem>> {
        let request = self.build_request(records)?;
        debug!(
            "Sending {} addresses to {} ({})",
            records.len(),
            self.config.base_url,
            self.config.model
        );

        let content = self.call_api(&request)?;
        let items = parse_extraction(&content)?;
        debug!("Extraction returned {} items", items.len());
        Ok(items)
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}
