//! Anthropic messages API provider.

use super::provider::{CompletionOptions, LlmError, LlmProvider, LlmProviderFactory};
use super::types::{CompletionResponse, Message, MessageRole, TokenUsage};
use crate::verification::AiAgent;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Connects to the Anthropic `/v1/messages` endpoint.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// System messages go to the top-level `system` field.
    fn to_request(&self, messages: &[Message], options: &CompletionOptions) -> MessagesRequest {
        let system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            system: if system.is_empty() { None } else { Some(system) },
            messages: messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(|m| ApiMessage {
                    role: match m.role {
                        MessageRole::Assistant => "assistant",
                        _ => "user",
                    },
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = self.to_request(messages, options);

        debug!(
            model = %self.model,
            message_count = messages.len(),
            "Sending completion request to Anthropic"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse Anthropic response: {}", e))
        })?;

        let content = parsed
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse(
                "Response contained no text content".to_string(),
            ));
        }

        debug!(
            stop_reason = ?parsed.stop_reason,
            "Received completion response from Anthropic"
        );

        Ok(CompletionResponse {
            content,
            stop_reason: parsed.stop_reason,
            usage: parsed.usage,
        })
    }
}

/// Creates an [`AnthropicProvider`] per agent, sharing one HTTP client.
pub struct AnthropicProviderFactory {
    client: Client,
    base_url: String,
}

impl AnthropicProviderFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl LlmProviderFactory for AnthropicProviderFactory {
    fn create(&self, agent: &AiAgent) -> Result<Arc<dyn LlmProvider>, LlmError> {
        if agent.api_key.trim().is_empty() {
            return Err(LlmError::Api {
                status: 401,
                message: format!("Agent {} has no API key", agent.name),
            });
        }
        Ok(Arc::new(AnthropicProvider::new(
            self.client.clone(),
            self.base_url.clone(),
            agent.api_key.clone(),
            agent.model.clone(),
        )))
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
