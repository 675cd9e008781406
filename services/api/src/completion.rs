use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use civisure_common::{AppError, AssistantConfig, ChatRole};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<CompletionMessage>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider rejected the API key")]
    Unauthorized,

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

impl From<CompletionError> for AppError {
    fn from(err: CompletionError) -> Self {
        tracing::error!("Assistant completion failed: {}", err);
        match err {
            CompletionError::Unauthorized => AppError::ServiceUnavailable(
                "Invalid API key. Please check your Anthropic API configuration.".to_string(),
            ),
            CompletionError::Unreachable(_) => AppError::ServiceUnavailable(
                "Legal assistant is temporarily unreachable. Please try again later.".to_string(),
            ),
            CompletionError::Upstream { .. } | CompletionError::Malformed(_) => {
                AppError::ExternalService(
                    "Failed to get response from legal assistant. Please try again.".to_string(),
                )
            }
        }
    }
}

/// A text-completion provider for the legal assistant.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [CompletionMessage],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(config: &AssistantConfig, api_key: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let body = MessagesBody {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &request.system,
            messages: &request.messages,
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CompletionError::Unreachable(e.to_string())
                } else {
                    CompletionError::Upstream {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CompletionError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| CompletionError::Malformed("no text block in response".to_string()))
    }
}
