pub mod api;
pub mod realtime;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// All routes with state attached. Cross-cutting layers (CORS, headers) are
/// added by the binary.
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(realtime::create_realtime_router())
        .with_state(state)
}
