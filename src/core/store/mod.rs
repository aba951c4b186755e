//! Durable session storage.
//!
//! [`SessionStore`] is the persistence seam: the session-start path reads
//! stored sessions from it, and the [`PersistenceTrigger`] upserts one report
//! per handler lifetime into it. [`InMemorySessionStore`] is the bundled
//! implementation.

mod memory;
mod trigger;

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::session::{HistoryEntry, Role, ScenarioContext, SessionReport};
use crate::core::tutor::SessionFeedback;

pub use memory::InMemorySessionStore;
pub use trigger::PersistenceTrigger;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Report has no session id")]
    MissingSessionId,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields of a session created ahead of its first connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scenario_place: Option<String>,
    #[serde(default)]
    pub scenario_partner: Option<String>,
    #[serde(default)]
    pub scenario_goal: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub show_text: Option<bool>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

/// One persisted utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub duration_sec: f64,
    /// Whether feedback has been attached
    pub is_feedback: bool,
    pub feedback: Option<String>,
    pub reason: Option<String>,
}

/// A stored session with its accumulated messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub title: String,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_sec: f64,
    pub user_speech_duration_sec: f64,
    pub scenario_place: Option<String>,
    pub scenario_partner: Option<String>,
    pub scenario_goal: Option<String>,
    pub voice: Option<String>,
    pub show_text: Option<bool>,
    pub feedback_summary: Option<String>,
    pub messages: Vec<StoredMessage>,
}

impl SessionRecord {
    pub fn scenario_context(&self) -> ScenarioContext {
        ScenarioContext {
            title: Some(self.title.clone()),
            place: self.scenario_place.clone(),
            partner: self.scenario_partner.clone(),
            goal: self.scenario_goal.clone(),
        }
    }

    /// Stored messages in replay form.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .map(|m| HistoryEntry::new(m.role.as_str(), m.content.clone()))
            .collect()
    }
}

/// Listing row: a session without its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_sec: f64,
    pub user_speech_duration_sec: f64,
    pub message_count: usize,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            title: record.title.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            started_at: record.started_at,
            ended_at: record.ended_at,
            total_duration_sec: record.total_duration_sec,
            user_speech_duration_sec: record.user_speech_duration_sec,
            message_count: record.messages.len(),
        }
    }
}

/// One page of an owner's sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPage {
    /// Sessions the owner has in total
    pub total: usize,
    pub items: Vec<SessionSummary>,
    pub has_next: bool,
}

/// Default title for sessions created without one.
pub fn default_title(at: DateTime<Utc>) -> String {
    format!("Scenario Session ({})", at.format("%Y-%m-%d %H:%M"))
}

/// Listing order: latest `ended_at` first, never-ended sessions last, then
/// newest created.
pub fn recency_order(a: &SessionRecord, b: &SessionRecord) -> Ordering {
    match (a.ended_at, b.ended_at) {
        (Some(a_end), Some(b_end)) => b_end.cmp(&a_end),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session with a fresh id.
    async fn create_session(&self, new: NewSession) -> StoreResult<SessionRecord>;

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Overwrite voice and show_text where given.
    async fn update_preferences(
        &self,
        session_id: &str,
        voice: Option<String>,
        show_text: Option<bool>,
    ) -> StoreResult<()>;

    /// Hand a session to a learner, e.g. a guest session claimed after
    /// sign-up. Replaces any previous owner.
    async fn update_owner(&self, session_id: &str, owner_id: i64) -> StoreResult<()>;

    /// An owner's sessions, most recently ended first. Sessions that never
    /// ended sort last.
    async fn list_sessions(&self, owner_id: i64, skip: usize, limit: usize)
    -> StoreResult<SessionPage>;

    /// The owner's most recently ended session.
    async fn recent_session(&self, owner_id: i64) -> StoreResult<Option<SessionRecord>>;

    /// Upsert a report: totals accumulate, messages are appended, optional
    /// fields are overwritten only when present in the report. Returns the
    /// newly stored messages.
    async fn save_report(
        &self,
        report: &SessionReport,
        owner_id: Option<i64>,
    ) -> StoreResult<Vec<StoredMessage>>;

    /// Store the summary and attach each correction to its message. Returns
    /// the number of messages updated.
    async fn apply_feedback(&self, session_id: &str, feedback: &SessionFeedback)
    -> StoreResult<usize>;
}
