use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::session::WpmStatus;
use crate::state::AppState;

/// Recent utterances handed to the hint generator.
const HINT_CONTEXT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintResponse {
    pub session_id: String,
    pub hints: Vec<String>,
    /// Learner speaking rate; absent when the session is not live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wpm_status: Option<WpmStatus>,
}

/// `GET /api/v1/hints/{session_id}` - reply suggestions for a live session
///
/// Always succeeds; the list is empty when the session is not connected,
/// no generator is configured, or generation fails.
pub async fn get_hints(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<HintResponse> {
    let live = state.registry.get(&session_id);
    let wpm_status = live.as_ref().map(|live| live.wpm_status());
    let hints = match (live, state.hints.as_ref()) {
        (Some(live), Some(generator)) => {
            let transcript = live.transcript_context(HINT_CONTEXT_LIMIT);
            debug!(session_id = %session_id, messages = transcript.len(), "Generating hints");
            match generator
                .generate_hints(&transcript, live.context())
                .await
            {
                Ok(hints) => hints,
                Err(e) => {
                    warn!(session_id = %session_id, "Hint generation failed: {}", e);
                    Vec::new()
                }
            }
        }
        (None, _) => {
            debug!(session_id = %session_id, "Hints requested for a session that is not live");
            Vec::new()
        }
        (Some(_), None) => Vec::new(),
    };

    Json(HintResponse {
        session_id,
        hints,
        wpm_status,
    })
}
