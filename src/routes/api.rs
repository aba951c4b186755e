use axum::{
    Router,
    routing::{get, put},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, hints, sessions};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST router
///
/// # Endpoints
///
/// - `GET /health` - liveness and connected session count
/// - `GET /prompt` - base tutor prompt
/// - `POST /api/v1/sessions` - create a session
/// - `GET /api/v1/sessions` - paginated listing for one learner
/// - `GET /api/v1/sessions/{session_id}` - session detail
/// - `PUT /api/v1/sessions/{session_id}/sync` - claim a guest session
/// - `GET /api/v1/recent` - a learner's latest session
/// - `GET /api/v1/hints/{session_id}` - reply suggestions for a live session
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/prompt", get(api::get_prompt))
        .route(
            "/api/v1/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route("/api/v1/sessions/{session_id}", get(sessions::get_session))
        .route("/api/v1/sessions/{session_id}/sync", put(sessions::sync_session))
        .route("/api/v1/recent", get(sessions::recent_session))
        .route("/api/v1/hints/{session_id}", get(hints::get_hints))
        .layer(TraceLayer::new_for_http())
}
