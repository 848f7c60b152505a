//! Conversation and streaming types for Inkwell.
//!
//! These types model the data shapes for chat orchestration: conversation
//! turns, stream requests, admission/quota snapshots, and the inline
//! markers appended to a text stream when generation ends abnormally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker appended to the output stream when the user stops generation.
pub const STOP_MARKER: &str = "\n\n[generation stopped]";

/// Marker appended to the output stream when the upstream provider fails
/// mid-generation.
pub const ERROR_MARKER: &str = "\n\n[generation error]";

/// Role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::System => write!(f, "system"),
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(TurnRole::System),
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// A single turn in a user's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    /// Build a turn stamped with the current time.
    pub fn now(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Body of a managed streaming chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
}

/// Credentials for a bring-your-own-account request.
///
/// The caller supplies their own API key and (optionally) a base URL for
/// an OpenAI-compatible endpoint. These requests bypass quota accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByoAccount {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Body of a bring-your-own-account streaming chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByoChatRequest {
    pub message: String,
    pub model: String,
    #[serde(flatten)]
    pub account: ByoAccount,
}

/// Point-in-time view of the admission controller's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSnapshot {
    /// Requests currently holding a concurrency slot.
    pub active: usize,
    /// Requests waiting in the FIFO queue.
    pub queued: usize,
    pub max_concurrent: usize,
    pub queue_capacity: usize,
}

impl fmt::Display for AdmissionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} active, {}/{} queued",
            self.active, self.max_concurrent, self.queued, self.queue_capacity
        )
    }
}

/// A request currently admitted or queued, as reported to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub ticket_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Outcome of a daily quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub can_use: bool,
    /// Units consumed so far today.
    pub current_usage: u64,
    /// Daily unit allowance.
    pub limit: u64,
}

/// Daily usage as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
}

impl UsageReport {
    pub fn new(used: u64, limit: u64) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_role_roundtrip() {
        for role in [TurnRole::System, TurnRole::User, TurnRole::Assistant] {
            let s = role.to_string();
            let parsed: TurnRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_turn_role_serde() {
        let json = serde_json::to_string(&TurnRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: TurnRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TurnRole::Assistant);
    }

    #[test]
    fn test_chat_turn_serde_roundtrip() {
        let turn = ChatTurn::now(TurnRole::User, "hello");
        let json = serde_json::to_string(&turn).unwrap();
        let parsed: ChatTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.role, TurnRole::User);
        assert_eq!(parsed.content, "hello");
    }

    #[test]
    fn test_byo_request_flattens_account() {
        let json = r#"{"message":"hi","model":"qwen-plus","api_key":"k","base_url":"api.example.com"}"#;
        let req: ByoChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.account.api_key, "k");
        assert_eq!(req.account.base_url.as_deref(), Some("api.example.com"));
    }

    #[test]
    fn test_usage_report_remaining_saturates() {
        let report = UsageReport::new(7_000, 6_000);
        assert_eq!(report.remaining, 0);
    }
}
