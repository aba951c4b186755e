//! Tutoring WebSocket handlers
//!
//! Each endpoint upgrades the connection, wires the socket to a
//! [`ClientChannel`] through a reader task and a writer task, and hands the
//! channel to [`run_session`]. The handler itself never touches the socket.

use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::realtime::openai::OpenAIRealtimeVoice;
use crate::core::session::SessionReport;
use crate::errors::SessionSetupError;
use crate::state::AppState;

use super::connection::{ConnectionHandler, HandlerSettings, HandlerState};
use super::messages::{CHANNEL_BUFFER_SIZE, ClientChannel, ClientEndpoint, ClientFrame, ClientRoute};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Time the writer gets to flush the final report and close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters accepted on the session endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionQuery {
    pub voice: Option<String>,
    pub show_text: Option<bool>,
    /// Requesting learner; ignored on the guest endpoint.
    ///
    /// Stands in for the authenticated identity: the gateway does not verify
    /// it, so the ownership check is only as strong as whatever sits in front
    /// of this endpoint.
    pub user_id: Option<i64>,
}

/// Who is asking for which session.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    /// `None` for anonymous demo sessions
    pub session_id: Option<String>,
    pub user_id: Option<i64>,
    pub voice: Option<String>,
    pub show_text: Option<bool>,
    /// Receives every handler state change
    pub state_listener: Option<mpsc::UnboundedSender<HandlerState>>,
}

/// `GET /ws/chat/{session_id}` - session owned by a learner
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let request = SessionRequest {
        session_id: Some(session_id),
        user_id: query.user_id,
        voice: query.voice,
        show_text: query.show_text,
        state_listener: None,
    };
    upgrade(ws, state, request)
}

/// `GET /ws/guest-chat/{session_id}` - unauthenticated learner
pub async fn guest_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let request = SessionRequest {
        session_id: Some(session_id),
        user_id: None,
        voice: query.voice,
        show_text: query.show_text,
        state_listener: None,
    };
    upgrade(ws, state, request)
}

/// `GET /ws/chat` - anonymous demo session, nothing is stored
pub async fn demo_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let request = SessionRequest {
        session_id: None,
        user_id: None,
        voice: query.voice,
        show_text: query.show_text,
        state_listener: None,
    };
    upgrade(ws, state, request)
}

fn upgrade(ws: WebSocketUpgrade, state: Arc<AppState>, request: SessionRequest) -> Response {
    info!(
        session_id = ?request.session_id,
        user_id = ?request.user_id,
        "Tutoring WebSocket connection upgrade requested"
    );

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, request))
}

/// Bridge a WebSocket to a session run.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, request: SessionRequest) {
    let (mut sender, mut receiver) = socket.split();
    let (channel, endpoint) = ClientChannel::pair(CHANNEL_BUFFER_SIZE);
    let ClientEndpoint {
        frames,
        mut routes,
    } = endpoint;

    // Sender task for outgoing messages
    let mut writer = tokio::spawn(async move {
        while let Some(route) = routes.recv().await {
            let should_close = matches!(route, ClientRoute::Close { .. });

            let result = match route {
                ClientRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                ClientRoute::Close { code, reason } => {
                    debug!(code, "Closing client WebSocket");
                    sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await
                }
            };

            if let Err(e) = result {
                warn!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    // Reader task for incoming frames
    let reader = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let frame = match msg {
                Ok(Message::Text(text)) => ClientFrame::Text(text.to_string()),
                Ok(Message::Binary(data)) => ClientFrame::Binary(data),
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Err(e) => {
                    warn!("Client WebSocket error: {}", e);
                    break;
                }
            };
            if frames.send(frame).await.is_err() {
                return;
            }
        }
        let _ = frames.send(ClientFrame::Close).await;
    });

    if let Err(e) = run_session(&state, request, channel).await {
        debug!("Session ended during setup: {}", e);
    }

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        warn!("Client writer did not drain in time");
        writer.abort();
    }
    reader.abort();
}

/// Start, run and persist one tutoring session over `client`.
///
/// Setup failures close the client with their status code. A report, when
/// one was produced, is handed to the persistence trigger before returning.
pub async fn run_session(
    state: &AppState,
    request: SessionRequest,
    client: ClientChannel,
) -> Result<Option<SessionReport>, SessionSetupError> {
    // Without a credential the handler fails in CONNECTING; nothing is loaded
    let api_key = state.api_key();
    if api_key.is_none() {
        error!(session_id = ?request.session_id, "OPENAI_API_KEY not configured");
    }

    let requested_voice = request.voice.as_deref().and_then(|raw| {
        let voice = OpenAIRealtimeVoice::parse(raw);
        if voice.is_none() {
            warn!(voice = raw, "Ignoring unsupported voice");
        }
        voice
    });

    let mut settings = HandlerSettings {
        api_key: api_key.clone(),
        session_id: request.session_id.clone(),
        title: None,
        context: None,
        voice: requested_voice.unwrap_or_default(),
        show_text: request.show_text,
        history: Vec::new(),
        base_prompt: state.base_prompt.clone(),
        wpm: state.config.wpm_settings(),
    };

    if api_key.is_some()
        && let Some(session_id) = request.session_id.as_deref()
        && let Err(e) = load_session(state, session_id, &request, requested_voice, &mut settings).await
    {
        warn!(session_id = %session_id, user_id = ?request.user_id, "Refusing session: {}", e);
        client.close(e.close_code(), e.close_reason()).await;
        return Err(e);
    }

    let mut handler = ConnectionHandler::new(
        settings,
        state.connector.clone(),
        state.registry.clone(),
        client,
    );
    if let Some(listener) = request.state_listener.clone() {
        handler = handler.with_state_listener(listener);
    }
    let report = handler.run().await?;

    if let Some(report) = report.clone() {
        state.persistence.submit(report, request.user_id).await;
    }
    Ok(report)
}

/// Apply stored preferences and replay state for an existing session.
async fn load_session(
    state: &AppState,
    session_id: &str,
    request: &SessionRequest,
    requested_voice: Option<OpenAIRealtimeVoice>,
    settings: &mut HandlerSettings,
) -> Result<(), SessionSetupError> {
    if requested_voice.is_some() || request.show_text.is_some() {
        let voice = requested_voice.map(|v| v.as_str().to_string());
        if let Err(e) = state
            .store
            .update_preferences(session_id, voice, request.show_text)
            .await
        {
            debug!(session_id = %session_id, "Preferences not saved: {}", e);
        }
    }

    let record = match state.store.get_session(session_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err(SessionSetupError::SessionNotFound),
        Err(e) => {
            error!(session_id = %session_id, "Session lookup failed: {}", e);
            return Err(SessionSetupError::SessionNotFound);
        }
    };

    if let Some(owner) = record.owner_id
        && request.user_id != Some(owner)
    {
        return Err(SessionSetupError::Unauthorized);
    }

    settings.title = Some(record.title.clone());
    settings.context = Some(record.scenario_context());
    settings.history = record.history();
    settings.show_text = request.show_text.or(record.show_text);
    settings.voice = requested_voice
        .or_else(|| record.voice.as_deref().and_then(OpenAIRealtimeVoice::parse))
        .unwrap_or_default();

    debug!(
        session_id = %session_id,
        history = settings.history.len(),
        voice = %settings.voice,
        "Loaded stored session"
    );
    Ok(())
}
