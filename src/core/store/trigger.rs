//! Hand-off of finished session reports to storage and feedback.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::SessionStore;
use crate::core::session::SessionReport;
use crate::core::tutor::FeedbackGenerator;

/// Persists reports and kicks off feedback generation in the background.
///
/// Failures here are logged and never reach the client connection.
#[derive(Clone)]
pub struct PersistenceTrigger {
    store: Arc<dyn SessionStore>,
    feedback: Option<Arc<dyn FeedbackGenerator>>,
    min_messages: usize,
}

impl PersistenceTrigger {
    pub fn new(
        store: Arc<dyn SessionStore>,
        feedback: Option<Arc<dyn FeedbackGenerator>>,
        min_messages: usize,
    ) -> Self {
        Self {
            store,
            feedback,
            min_messages,
        }
    }

    /// Save `report` and, when enough new messages were stored, spawn a
    /// feedback job. Returns the job handle if one was spawned.
    pub async fn submit(&self, report: SessionReport, owner_id: Option<i64>) -> Option<JoinHandle<()>> {
        let Some(session_id) = report.session_id.clone() else {
            debug!("Anonymous session, report not persisted");
            return None;
        };

        let stored = match self.store.save_report(&report, owner_id).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(session_id = %session_id, "Failed to save session report: {}", e);
                return None;
            }
        };

        let feedback = self.feedback.clone()?;
        if stored.len() <= self.min_messages {
            debug!(
                session_id = %session_id,
                messages = stored.len(),
                "Not enough messages for feedback"
            );
            return None;
        }

        let store = self.store.clone();
        Some(tokio::spawn(async move {
            info!(session_id = %session_id, messages = stored.len(), "Generating session feedback");
            match feedback.generate_feedback(&stored).await {
                Ok(result) => {
                    if let Err(e) = store.apply_feedback(&session_id, &result).await {
                        warn!(session_id = %session_id, "Failed to store feedback: {}", e);
                    }
                }
                Err(e) => warn!(session_id = %session_id, "Feedback generation failed: {}", e),
            }
        }))
    }
}
