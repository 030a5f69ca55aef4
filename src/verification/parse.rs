//! Parsing of the model's verdict out of its free-text reply.
//!
//! The reply is first parsed as strict JSON. Models often wrap the object in
//! prose or code fences, so the fallback parses the span between the first
//! `{` and the last `}`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReply {
    pub is_ukrainian: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub analysis: String,
    #[serde(default, deserialize_with = "deserialize_album_id")]
    pub matched_album_id: Option<String>,
}

/// Accepts string or numeric ids. Any other shape reads as no match so the
/// verdict itself is kept.
fn deserialize_album_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

impl VerificationReply {
    fn sanitized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.matched_album_id = self
            .matched_album_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("null"));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplyParseError {
    #[error("Reply contains no JSON object")]
    NoJsonObject,

    #[error("Invalid JSON in reply: {0}")]
    InvalidJson(String),
}

pub fn parse_reply(text: &str) -> Result<VerificationReply, ReplyParseError> {
    let trimmed = text.trim();
    if let Ok(reply) = serde_json::from_str::<VerificationReply>(trimmed) {
        return Ok(reply.sanitized());
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str::<VerificationReply>(&trimmed[start..=end])
                .map(VerificationReply::sanitized)
                .map_err(|e| ReplyParseError::InvalidJson(e.to_string()))
        }
        _ => Err(ReplyParseError::NoJsonObject),
    }
}
