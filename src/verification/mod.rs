//! LLM-assisted verification of relevant catalogue entries and the admin
//! decisions applied to the results.

mod decision;
mod engine;
pub mod llm;
mod models;
mod parse;
mod prompt;
mod seed;

pub use decision::DecisionResolver;
pub use engine::{
    AiVerificationEngine, VerificationError, NO_ACTIVE_AGENT_MESSAGE, PROGRESS_CHANNEL_CAPACITY,
};
pub use models::{
    AiAgent, AiVerification, ProgressEventType, VerificationDecision, VerificationProgress,
};
pub use parse::{parse_reply, ReplyParseError, VerificationReply};
pub use prompt::{format_discography, render_prompt, DEFAULT_PROMPT_TEMPLATE};
pub use seed::seed_agent;
