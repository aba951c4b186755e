//! Transcript bookkeeping and the end-of-session report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner
    User,
    /// The tutor persona
    Assistant,
}

impl Role {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role. Anything but the two conversational roles is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A prior turn replayed into a fresh upstream connection.
///
/// `role` stays a free-form string: stored history may contain roles the
/// injector has to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// One completed utterance in the live conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub duration_sec: f64,
}

impl TranscriptEntry {
    pub fn new(role: Role, content: impl Into<String>, duration_sec: f64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            duration_sec,
        }
    }
}

impl From<&TranscriptEntry> for HistoryEntry {
    fn from(entry: &TranscriptEntry) -> Self {
        HistoryEntry::new(entry.role.as_str(), entry.content.clone())
    }
}

/// Role-play scenario attached to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioContext {
    pub title: Option<String>,
    pub place: Option<String>,
    pub partner: Option<String>,
    pub goal: Option<String>,
}

/// Immutable summary of one handler lifetime, handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Option<String>,
    pub title: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_duration_sec: f64,
    pub user_speech_duration_sec: f64,
    pub messages: Vec<TranscriptEntry>,
    pub scenario_place: Option<String>,
    pub scenario_partner: Option<String>,
    pub scenario_goal: Option<String>,
    pub voice: Option<String>,
    pub show_text: Option<bool>,
}

impl SessionReport {
    /// Seconds of learner speech across `messages`.
    pub fn user_speech_seconds(messages: &[TranscriptEntry]) -> f64 {
        messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.duration_sec)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn test_transcript_entry_serialization() {
        let entry = TranscriptEntry::new(Role::Assistant, "Hello!", 1.5);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "Hello!");
        assert_eq!(json["duration_sec"], 1.5);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_user_speech_seconds() {
        let messages = vec![
            TranscriptEntry::new(Role::User, "Hi", 1.0),
            TranscriptEntry::new(Role::Assistant, "Hello", 2.0),
            TranscriptEntry::new(Role::User, "How are you", 1.5),
        ];
        assert_eq!(SessionReport::user_speech_seconds(&messages), 2.5);
    }
}
