//! Verification records, agent configuration and run progress events.

use serde::{Deserialize, Serialize};

/// Human or automated decision applied to a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationDecision {
    Confirmed,
    Rejected,
}

impl VerificationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONFIRMED" => Some(Self::Confirmed),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One LLM judgement about a catalogue index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiVerification {
    pub id: String,
    pub catalogue_index_id: String,
    pub band_name: String,
    pub album_title: String,
    pub is_ukrainian: bool,
    pub confidence_score: f64,
    pub ai_analysis: String,
    pub matched_discography_id: Option<String>,
    /// None while the verification is pending.
    pub admin_decision: Option<VerificationDecision>,
    pub admin_decision_at: Option<i64>,
    pub created_at: i64,
}

impl AiVerification {
    pub fn is_pending(&self) -> bool {
        self.admin_decision.is_none()
    }
}

/// Stored LLM agent configuration. At most one agent is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAgent {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Template with `{{bandName}}`, `{{albumTitle}}` and `{{discography}}` placeholders.
    pub prompt_template: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_concurrent_requests: u32,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressEventType {
    Started,
    Progress,
    Completed,
    Error,
}

/// A single event of a verification run's progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationProgress {
    #[serde(rename = "type")]
    pub event_type: ProgressEventType,
    pub processed: usize,
    pub total: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VerificationProgress {
    pub fn started(total: usize) -> Self {
        Self {
            event_type: ProgressEventType::Started,
            processed: 0,
            total,
            failed: 0,
            current_label: None,
            error_message: None,
        }
    }

    pub fn progress(processed: usize, total: usize, failed: usize, label: String) -> Self {
        Self {
            event_type: ProgressEventType::Progress,
            processed,
            total,
            failed,
            current_label: Some(label),
            error_message: None,
        }
    }

    pub fn completed(processed: usize, total: usize, failed: usize) -> Self {
        Self {
            event_type: ProgressEventType::Completed,
            processed,
            total,
            failed,
            current_label: None,
            error_message: None,
        }
    }

    pub fn error(processed: usize, total: usize, failed: usize, message: impl Into<String>) -> Self {
        Self {
            event_type: ProgressEventType::Error,
            processed,
            total,
            failed,
            current_label: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            ProgressEventType::Completed | ProgressEventType::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_wire_format() {
        let event = VerificationProgress::progress(3, 10, 1, "Drudkh - Autumn Aurora".into());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["processed"], 3);
        assert_eq!(json["total"], 10);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["current_label"], "Drudkh - Autumn Aurora");
        assert!(json.get("error_message").is_none());
    }

    #[test]
    fn test_terminal_events() {
        assert!(VerificationProgress::completed(0, 0, 0).is_terminal());
        assert!(VerificationProgress::error(0, 0, 0, "boom").is_terminal());
        assert!(!VerificationProgress::started(4).is_terminal());
    }

    #[test]
    fn test_agent_api_key_is_not_serialized() {
        let agent = AiAgent {
            id: "a".into(),
            name: "default".into(),
            description: None,
            prompt_template: String::new(),
            model: "m".into(),
            max_tokens: 1024,
            max_concurrent_requests: 5,
            api_key: "secret".into(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_string(&agent).unwrap();
        assert!(!json.contains("secret"));
    }
}
