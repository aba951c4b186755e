use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Sessions with a connected client
    pub active_sessions: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        active_sessions: state.registry.len(),
    })
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: String,
}

/// Base tutor prompt currently in use
pub async fn get_prompt(State(state): State<Arc<AppState>>) -> Json<PromptResponse> {
    Json(PromptResponse {
        prompt: state.base_prompt.clone(),
    })
}
