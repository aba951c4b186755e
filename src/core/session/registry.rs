//! Directory of live sessions, keyed by external session id.
//!
//! Created once per process and injected through `AppState`; tests build
//! their own. Entries are owned by a [`RegistryGuard`] that removes them when
//! the connection handler finishes, however it finishes.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::live::LiveSession;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<LiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the live session for `session_id`.
    pub fn add(&self, session_id: impl Into<String>, session: Arc<LiveSession>) {
        let session_id = session_id.into();
        debug!(session_id = %session_id, "Registering live session");
        self.sessions.insert(session_id, session);
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Register `session` and return a guard that unregisters it on drop.
    pub fn register(
        self: &Arc<Self>,
        session_id: impl Into<String>,
        session: Arc<LiveSession>,
    ) -> RegistryGuard {
        let session_id = session_id.into();
        self.add(session_id.clone(), session.clone());
        RegistryGuard {
            registry: Arc::clone(self),
            session_id,
            session,
        }
    }
}

/// Removes its entry from the registry when dropped.
///
/// Only the entry this guard registered is removed: when a reconnecting
/// client has already registered a newer handler under the same id, that
/// entry stays.
#[derive(Debug)]
pub struct RegistryGuard {
    registry: Arc<SessionRegistry>,
    session_id: String,
    session: Arc<LiveSession>,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        let removed = self
            .registry
            .sessions
            .remove_if(&self.session_id, |_, current| {
                Arc::ptr_eq(current, &self.session)
            });
        if removed.is_some() {
            debug!(session_id = %self.session_id, "Unregistered live session");
        }
    }
}
