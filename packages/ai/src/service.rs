// ABOUTME: Completion client for code generation calls to Anthropic Claude
// ABOUTME: Handles API requests, error mapping and the quota fallback to a second model

use std::time::Duration;

use draftly_config::{AiSettings, ConfigError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("{0}")]
    Unavailable(String),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("No API key configured")]
    NoApiKey,

    #[error("Invalid response format")]
    InvalidResponse,

    #[error("Response does not appear to contain JSON structure")]
    NoJsonStructure,
}

impl CompletionError {
    /// Rate limiting or exhausted quota, worth retrying on another model
    pub fn is_quota_or_limit(&self) -> bool {
        match self {
            CompletionError::ApiError { status, message } => {
                let message = message.to_lowercase();
                *status == 429 || message.contains("quota") || message.contains("limit")
            }
            _ => false,
        }
    }
}

pub type CompletionResult<T> = Result<T, CompletionError>;

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Raw completion text plus accounting
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
    /// Model that actually produced the text
    pub model: String,
}

pub struct CompletionClient {
    client: Client,
    settings: AiSettings,
}

impl CompletionClient {
    fn create_client() -> Client {
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            })
    }

    pub fn new(settings: AiSettings) -> Self {
        if settings.api_key.is_none() {
            info!("ANTHROPIC_API_KEY not set - completions will fail until a key is configured");
        }
        Self {
            client: Self::create_client(),
            settings,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(AiSettings::from_env()?))
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    /// Request a completion from the primary model.
    ///
    /// When the primary model is rate limited or out of quota the request is
    /// repeated once against the fallback model. Any other failure is returned
    /// as is.
    pub async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> CompletionResult<Completion> {
        let primary = &self.settings.primary_model;
        let fallback = &self.settings.fallback_model;

        match self.complete_with_model(primary, prompt, system).await {
            Err(e) if e.is_quota_or_limit() && fallback != primary => {
                warn!(
                    "Primary model {} quota reached ({}), switching to fallback model {}",
                    primary, e, fallback
                );
                self.complete_with_model(fallback, prompt, system)
                    .await
                    .map_err(|fallback_error| {
                        error!("Fallback model {} failed: {}", fallback, fallback_error);
                        fallback_error
                    })
            }
            other => other,
        }
    }

    async fn complete_with_model(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
    ) -> CompletionResult<Completion> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(CompletionError::NoApiKey)?;

        let request = AnthropicRequest {
            model,
            max_tokens: self.settings.max_tokens,
            temperature: DEFAULT_TEMPERATURE,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            system,
        };

        info!(
            "Making Anthropic API request: model={}, max_tokens={}",
            model, request.max_tokens
        );

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Anthropic API request timed out after {:?}", REQUEST_TIMEOUT);
                    CompletionError::Unavailable(format!(
                        "Request timed out after {} seconds. The AI service may be overloaded or unavailable.",
                        REQUEST_TIMEOUT.as_secs()
                    ))
                } else if e.is_connect() {
                    error!("Failed to connect to Anthropic API: {}", e);
                    CompletionError::Unavailable(format!(
                        "Connection failed: {}. Please check your internet connection.",
                        e
                    ))
                } else {
                    error!("Anthropic API request failed: {}", e);
                    CompletionError::RequestFailed(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Anthropic API error: {} - {}", status, message);
            return Err(CompletionError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::ParseError(e.to_string()))?;

        let text = body
            .content
            .iter()
            .find(|block| block.content_type == "text")
            .map(|block| block.text.clone())
            .ok_or(CompletionError::InvalidResponse)?;

        info!(
            "Completion received: model={}, {} chars, {} tokens",
            model,
            text.chars().count(),
            body.usage.total_tokens()
        );

        if !text.contains('{') || !text.contains('}') {
            warn!("Completion from {} has no JSON structure", model);
            return Err(CompletionError::NoJsonStructure);
        }

        Ok(Completion {
            text,
            usage: body.usage,
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, message: &str) -> CompletionError {
        CompletionError::ApiError {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_quota_detection() {
        assert!(api_error(429, "slow down").is_quota_or_limit());
        assert!(api_error(400, "You exceeded your current quota").is_quota_or_limit());
        assert!(api_error(403, "Rate LIMIT reached").is_quota_or_limit());
        assert!(!api_error(500, "internal error").is_quota_or_limit());
        assert!(!CompletionError::NoJsonStructure.is_quota_or_limit());
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            input_tokens: 12,
            output_tokens: 30,
        };
        assert_eq!(usage.total_tokens(), 42);
    }
}
