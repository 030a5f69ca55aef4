//! LLM provider trait definition.

use super::types::{CompletionResponse, Message};
use crate::verification::AiAgent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Options for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Errors that can occur when interacting with an LLM provider.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LlmError {
    /// Auth failures, exhausted credit, denied access and rate limits. Any
    /// further request in the same run would fail the same way.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => matches!(status, 401 | 402 | 403 | 429),
            _ => false,
        }
    }
}

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider's name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Get the model being used.
    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError>;
}

/// Builds a provider for the agent a verification run uses.
pub trait LlmProviderFactory: Send + Sync {
    fn create(&self, agent: &AiAgent) -> Result<Arc<dyn LlmProvider>, LlmError>;
}
