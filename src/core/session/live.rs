//! Shared view of a session that is currently connected.

use parking_lot::RwLock;

use super::transcript::{ScenarioContext, TranscriptEntry};
use super::wpm::WpmStatus;

/// State of a live conversation that other request paths may read.
///
/// The connection handler is the only writer. Readers (hint generation) get
/// copies, so a lock is never held across an await.
#[derive(Debug, Default)]
pub struct LiveSession {
    context: Option<ScenarioContext>,
    transcript: RwLock<Vec<TranscriptEntry>>,
    wpm_status: RwLock<WpmStatus>,
}

impl LiveSession {
    pub fn new(context: Option<ScenarioContext>) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }

    pub fn context(&self) -> Option<&ScenarioContext> {
        self.context.as_ref()
    }

    /// Append a completed utterance.
    pub fn record(&self, entry: TranscriptEntry) {
        self.transcript.write().push(entry);
    }

    /// The most recent `limit` entries, oldest first.
    pub fn transcript_context(&self, limit: usize) -> Vec<TranscriptEntry> {
        let transcript = self.transcript.read();
        let start = transcript.len().saturating_sub(limit);
        transcript[start..].to_vec()
    }

    /// Copy of the whole transcript.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.read().clone()
    }

    pub fn len(&self) -> usize {
        self.transcript.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn wpm_status(&self) -> WpmStatus {
        *self.wpm_status.read()
    }

    pub(crate) fn set_wpm_status(&self, status: WpmStatus) {
        *self.wpm_status.write() = status;
    }
}
