use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    NewSession, SessionPage, SessionRecord, SessionStore, SessionSummary, StoreError,
    StoreResult, StoredMessage, default_title, recency_order,
};
use crate::core::session::SessionReport;
use crate::core::tutor::SessionFeedback;

/// Process-local store. Contents are lost on restart.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
    next_message_id: AtomicU64,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            next_message_id: AtomicU64::new(1),
        }
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn owned_by(&self, owner_id: i64) -> Vec<SessionRecord> {
        let mut owned: Vec<SessionRecord> = self
            .sessions
            .iter()
            .filter(|r| r.owner_id == Some(owner_id))
            .map(|r| r.value().clone())
            .collect();
        owned.sort_by(recency_order);
        owned
    }

    fn empty_record(session_id: String, report: &SessionReport) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id,
            title: default_title(report.started_at),
            owner_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            total_duration_sec: 0.0,
            user_speech_duration_sec: 0.0,
            scenario_place: None,
            scenario_partner: None,
            scenario_goal: None,
            voice: None,
            show_text: None,
            feedback_summary: None,
            messages: Vec::new(),
        }
    }
}

fn overwrite<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, new: NewSession) -> StoreResult<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            title: new.title.unwrap_or_else(|| default_title(now)),
            owner_id: new.owner_id,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            total_duration_sec: 0.0,
            user_speech_duration_sec: 0.0,
            scenario_place: new.scenario_place,
            scenario_partner: new.scenario_partner,
            scenario_goal: new.scenario_goal,
            voice: new.voice,
            show_text: new.show_text,
            feedback_summary: None,
            messages: Vec::new(),
        };
        info!(session_id = %record.session_id, "Created session");
        self.sessions
            .insert(record.session_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.sessions.get(session_id).map(|r| r.value().clone()))
    }

    async fn update_preferences(
        &self,
        session_id: &str,
        voice: Option<String>,
        show_text: Option<bool>,
    ) -> StoreResult<()> {
        let mut record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        overwrite(&mut record.voice, &voice);
        overwrite(&mut record.show_text, &show_text);
        record.updated_at = Utc::now();
        debug!(session_id, ?voice, ?show_text, "Updated session preferences");
        Ok(())
    }

    async fn update_owner(&self, session_id: &str, owner_id: i64) -> StoreResult<()> {
        let mut record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        let previous = record.owner_id.replace(owner_id);
        record.updated_at = Utc::now();
        info!(session_id, owner_id, ?previous, "Session owner updated");
        Ok(())
    }

    async fn list_sessions(
        &self,
        owner_id: i64,
        skip: usize,
        limit: usize,
    ) -> StoreResult<SessionPage> {
        let owned = self.owned_by(owner_id);
        let total = owned.len();
        let items: Vec<SessionSummary> = owned
            .iter()
            .skip(skip)
            .take(limit)
            .map(SessionSummary::from)
            .collect();
        let has_next = skip.saturating_add(items.len()) < total;
        Ok(SessionPage {
            total,
            items,
            has_next,
        })
    }

    async fn recent_session(&self, owner_id: i64) -> StoreResult<Option<SessionRecord>> {
        Ok(self.owned_by(owner_id).into_iter().next())
    }

    async fn save_report(
        &self,
        report: &SessionReport,
        owner_id: Option<i64>,
    ) -> StoreResult<Vec<StoredMessage>> {
        let session_id = report
            .session_id
            .clone()
            .ok_or(StoreError::MissingSessionId)?;

        let mut record = match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                debug!(session_id = %session_id, "Creating session from report");
                entry.insert(Self::empty_record(session_id.clone(), report))
            }
        };

        record.total_duration_sec += report.total_duration_sec;
        record.user_speech_duration_sec += report.user_speech_duration_sec;
        if record.started_at.is_none() {
            record.started_at = Some(report.started_at);
        }
        record.ended_at = Some(report.ended_at);
        overwrite(&mut record.scenario_place, &report.scenario_place);
        overwrite(&mut record.scenario_partner, &report.scenario_partner);
        overwrite(&mut record.scenario_goal, &report.scenario_goal);
        overwrite(&mut record.voice, &report.voice);
        overwrite(&mut record.show_text, &report.show_text);
        if let Some(title) = &report.title {
            record.title = title.clone();
        }
        if record.owner_id.is_none() {
            record.owner_id = owner_id;
        }

        let stored: Vec<StoredMessage> = report
            .messages
            .iter()
            .map(|m| StoredMessage {
                id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
                role: m.role,
                content: m.content.clone(),
                timestamp: m.timestamp,
                duration_sec: m.duration_sec,
                is_feedback: false,
                feedback: None,
                reason: None,
            })
            .collect();
        record.messages.extend(stored.iter().cloned());
        record.updated_at = Utc::now();

        info!(
            session_id = %session_id,
            new_messages = stored.len(),
            total_messages = record.messages.len(),
            "Saved session report"
        );
        Ok(stored)
    }

    async fn apply_feedback(
        &self,
        session_id: &str,
        feedback: &SessionFeedback,
    ) -> StoreResult<usize> {
        let mut record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        record.feedback_summary = Some(feedback.summary.clone());
        let mut updated = 0;
        for correction in &feedback.corrections {
            if let Some(message) = record
                .messages
                .iter_mut()
                .find(|m| m.id == correction.message_id)
            {
                message.is_feedback = true;
                message.feedback = Some(correction.feedback.clone());
                message.reason = correction.reason.clone();
                updated += 1;
            }
        }
        record.updated_at = Utc::now();
        Ok(updated)
    }
}
