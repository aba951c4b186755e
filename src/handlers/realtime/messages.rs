//! Tutoring WebSocket message types
//!
//! JSON frames carry a `type` tag. Binary frames from the client are raw
//! PCM16 audio appended to the upstream input buffer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::session::{SessionReport, WpmStatus};

/// Maximum allowed size for instructions (100 KB)
pub const MAX_INSTRUCTIONS_SIZE: usize = 100 * 1024;

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Buffered frames per direction
pub const CHANNEL_BUFFER_SIZE: usize = 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the learner's client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Base64 PCM16 audio chunk
    #[serde(rename = "input_audio_buffer.append")]
    AudioAppend {
        /// Base64-encoded audio
        audio: String,
    },

    /// Commit the audio buffer (manual turn end)
    #[serde(rename = "input_audio_buffer.commit")]
    AudioCommit,

    /// Discard buffered audio
    #[serde(rename = "input_audio_buffer.clear")]
    AudioClear,

    /// Ask the tutor to respond
    #[serde(rename = "response.create")]
    ResponseCreate,

    /// Typed learner turn
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },

    /// Settings delta; any subset of the session settings plus `instructions`
    #[serde(rename = "session.update")]
    SessionUpdate {
        #[serde(default, alias = "session")]
        config: Map<String, Value>,
    },

    /// End the session
    #[serde(rename = "disconnect")]
    Disconnect,
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to the learner's client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Upstream link is configured, relay is live
    #[serde(rename = "ready")]
    Ready {
        session_id: Option<String>,
    },

    /// Tutor audio chunk (base64 PCM16)
    #[serde(rename = "audio.delta")]
    AudioDelta { delta: String },

    /// Tutor finished speaking
    #[serde(rename = "audio.done")]
    AudioDone,

    /// Final tutor transcript of one turn
    #[serde(rename = "transcript.done")]
    TranscriptDone { transcript: String },

    /// Final learner transcript of one turn
    #[serde(rename = "user.transcript")]
    UserTranscript { transcript: String },

    #[serde(rename = "speech.started")]
    SpeechStarted,

    #[serde(rename = "speech.stopped")]
    SpeechStopped,

    /// Speaking-rate status change
    #[serde(rename = "debug.state")]
    DebugState {
        wpm_status: WpmStatus,
        dynamic_instruction: String,
    },

    /// Error message
    #[serde(rename = "error")]
    Error {
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Error message
        message: String,
    },

    /// Session ended; carries the report when one was produced
    #[serde(rename = "disconnected")]
    Disconnected {
        reason: String,
        report: Option<SessionReport>,
    },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// Frame received from the client socket
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// JSON text frame
    Text(String),
    /// Raw PCM16 audio
    Binary(Bytes),
    /// Client closed the socket
    Close,
}

/// Work item for the socket writer task
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRoute {
    /// JSON text message
    Outgoing(ServerMessage),
    /// Close the connection with a status code
    Close { code: u16, reason: String },
}

/// Handler side of a client connection.
#[derive(Debug)]
pub struct ClientChannel {
    pub inbound: mpsc::Receiver<ClientFrame>,
    pub outbound: mpsc::Sender<ClientRoute>,
}

/// Socket side of a client connection: the WebSocket glue (or a test)
/// pushes frames in and drains routes out.
#[derive(Debug)]
pub struct ClientEndpoint {
    pub frames: mpsc::Sender<ClientFrame>,
    pub routes: mpsc::Receiver<ClientRoute>,
}

impl ClientChannel {
    /// Connected channel/endpoint pair.
    pub fn pair(capacity: usize) -> (ClientChannel, ClientEndpoint) {
        let (frame_tx, frame_rx) = mpsc::channel(capacity);
        let (route_tx, route_rx) = mpsc::channel(capacity);
        (
            ClientChannel {
                inbound: frame_rx,
                outbound: route_tx,
            },
            ClientEndpoint {
                frames: frame_tx,
                routes: route_rx,
            },
        )
    }

    /// Queue a message for the client. A gone client is not an error here;
    /// the inbound side reports the disconnect.
    pub async fn send(&self, message: ServerMessage) {
        let _ = self.outbound.send(ClientRoute::Outgoing(message)).await;
    }

    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        let _ = self
            .outbound
            .send(ClientRoute::Close {
                code,
                reason: reason.into(),
            })
            .await;
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Error type for message validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Instructions too large: {size} bytes (max: {max} bytes)")]
    InstructionsTooLarge { size: usize, max: usize },

    #[error("Text too large: {size} bytes (max: {max} bytes)")]
    TextTooLarge { size: usize, max: usize },
}

impl ClientMessage {
    /// Validates message field sizes to prevent resource exhaustion.
    pub fn validate_size(&self) -> Result<(), ValidationError> {
        match self {
            ClientMessage::SessionUpdate { config } => {
                if let Some(Value::String(instructions)) = config.get("instructions") {
                    let size = instructions.len();
                    if size > MAX_INSTRUCTIONS_SIZE {
                        return Err(ValidationError::InstructionsTooLarge {
                            size,
                            max: MAX_INSTRUCTIONS_SIZE,
                        });
                    }
                }
            }
            ClientMessage::Text { text } => {
                let size = text.len();
                if size > MAX_TEXT_SIZE {
                    return Err(ValidationError::TextTooLarge {
                        size,
                        max: MAX_TEXT_SIZE,
                    });
                }
            }
            ClientMessage::AudioAppend { .. }
            | ClientMessage::AudioCommit
            | ClientMessage::AudioClear
            | ClientMessage::ResponseCreate
            | ClientMessage::Disconnect => {}
        }
        Ok(())
    }
}
