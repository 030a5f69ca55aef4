//! LLM provider abstraction layer.

mod anthropic;
mod provider;
mod types;

pub use anthropic::{AnthropicProvider, AnthropicProviderFactory, ANTHROPIC_VERSION};
pub use provider::{CompletionOptions, LlmError, LlmProvider, LlmProviderFactory};
pub use types::{CompletionResponse, Message, MessageRole, TokenUsage};
