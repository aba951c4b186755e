//! Tutoring WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::{chat_handler, demo_chat_handler, guest_chat_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the tutoring WebSocket router
///
/// # Endpoints
///
/// - `GET /ws/chat/{session_id}?voice=&show_text=&user_id=` - learner session
/// - `GET /ws/guest-chat/{session_id}?voice=&show_text=` - guest session
/// - `GET /ws/chat?voice=&show_text=` - anonymous demo, not persisted
///
/// # Example
///
/// ```json
/// // Server announces the live relay
/// {"type": "ready", "session_id": "5f0c..."}
///
/// // Client streams audio as binary frames or as JSON
/// {"type": "input_audio_buffer.append", "audio": "<base64 pcm16>"}
///
/// // Server relays the tutor and closes with the report
/// {"type": "transcript.done", "transcript": "Nice to meet you!"}
/// {"type": "disconnected", "reason": "client_disconnected", "report": {...}}
/// ```
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/chat", get(demo_chat_handler))
        .route("/ws/chat/{session_id}", get(chat_handler))
        .route("/ws/guest-chat/{session_id}", get(guest_chat_handler))
        .layer(TraceLayer::new_for_http())
}
