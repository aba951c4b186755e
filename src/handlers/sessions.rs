//! Stored session endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::core::realtime::openai::OpenAIRealtimeVoice;
use crate::core::store::{NewSession, SessionPage, SessionRecord};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Largest page a listing returns
pub const MAX_PAGE_SIZE: usize = 100;

fn default_limit() -> usize {
    20
}

/// Learner the request acts for. Like the WebSocket `user_id`, it stands in
/// for an authenticated identity and is not verified here.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: i64,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    pub status: String,
    pub session_id: String,
}

/// `POST /api/v1/sessions` - create an empty session ahead of its first connection
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewSession>,
) -> AppResult<(StatusCode, Json<SessionRecord>)> {
    if let Some(voice) = new.voice.as_deref()
        && OpenAIRealtimeVoice::parse(voice).is_none()
    {
        return Err(AppError::BadRequest(format!("Unsupported voice: {voice}")));
    }

    let record = state.store.create_session(new).await?;
    info!(session_id = %record.session_id, owner_id = ?record.owner_id, "Session created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/v1/sessions/{session_id}` - session detail with messages
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionRecord>> {
    state
        .store
        .get_session(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {session_id}")))
}

/// `GET /api/v1/sessions?user_id=&skip=&limit=` - one page of the learner's
/// sessions without their messages
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<SessionPage>> {
    let limit = query.limit.min(MAX_PAGE_SIZE);
    let page = state
        .store
        .list_sessions(query.user_id, query.skip, limit)
        .await?;
    Ok(Json(page))
}

/// `PUT /api/v1/sessions/{session_id}/sync?user_id=` - claim a guest session
/// for a learner who signed up after talking
pub async fn sync_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(owner): Query<OwnerQuery>,
) -> AppResult<Json<SyncResponse>> {
    state.store.update_owner(&session_id, owner.user_id).await?;
    info!(session_id = %session_id, owner_id = owner.user_id, "Guest session claimed");
    Ok(Json(SyncResponse {
        status: "success".to_string(),
        session_id,
    }))
}

/// `GET /api/v1/recent?user_id=` - the learner's latest session with messages,
/// or `null` when they have none
pub async fn recent_session(
    State(state): State<Arc<AppState>>,
    Query(owner): Query<OwnerQuery>,
) -> AppResult<Json<Option<SessionRecord>>> {
    Ok(Json(state.store.recent_session(owner.user_id).await?))
}
