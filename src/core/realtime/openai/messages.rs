//! OpenAI Realtime API WebSocket message types.
//!
//! Only the slice of the protocol the tutoring bridge needs is modelled.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Full or partial session configuration
//! - input_audio_buffer.append / commit / clear - Learner audio
//! - conversation.item.create - Replayed history and typed learner turns
//! - response.create - Ask the model to respond
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.completed
//! - response.audio.delta / response.audio.done
//! - response.audio_transcript.delta / response.audio_transcript.done
//! - response.text.done
//! - response.done
//! - error
//!
//! Anything else deserializes to [`ServerEvent::Unknown`] and is ignored.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for the OpenAI Realtime API.
///
/// Every field is optional so the same type carries both the full initial
/// configuration and partial live updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

impl SessionConfig {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic VAD
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        /// Eagerness level
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item type
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item role (user, assistant)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    /// Build a text message item for `role`.
    ///
    /// User turns carry `input_text` parts, assistant turns carry `text` parts.
    pub fn text_message(role: &str, text: impl Into<String>) -> Self {
        let content_type = if role == "assistant" {
            "text"
        } else {
            "input_text"
        };
        Self {
            item_type: "message".to_string(),
            role: Some(role.to_string()),
            content: vec![ContentPart {
                content_type: content_type.to_string(),
                text: Some(text.into()),
            }],
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, text)
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Clear the input audio buffer
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
            Self::InputAudioBufferClear => "input_audio_buffer.clear",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: Session,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: Session,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio start timestamp in ms
        audio_start_ms: u64,
        /// Item ID
        item_id: String,
    },

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        /// Audio end timestamp in ms
        audio_end_ms: u64,
        /// Item ID
        item_id: String,
    },

    /// Learner audio transcription completed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        /// Item ID
        item_id: String,
        /// Transcript text
        transcript: String,
    },

    /// Audio delta
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Base64-encoded audio delta
        delta: String,
    },

    /// Audio done
    #[serde(rename = "response.audio.done")]
    AudioDone {
        /// Item ID
        #[serde(default)]
        item_id: String,
    },

    /// Audio transcript delta
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Transcript delta
        delta: String,
    },

    /// Audio transcript done
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Full transcript
        transcript: String,
    },

    /// Text response done
    #[serde(rename = "response.text.done")]
    TextDone {
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Full text
        text: String,
    },

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone {},

    /// Any event type the bridge does not consume
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Number of PCM bytes carried by a base64 audio delta, without decoding it.
    pub fn decoded_audio_len(delta: &str) -> usize {
        let trimmed = delta.trim_end();
        let padding = trimmed.bytes().rev().take_while(|b| *b == b'=').count();
        (trimmed.len() / 4 * 3).saturating_sub(padding)
    }
}

/// API error details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Session information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Voice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_serialization() {
        let event = ClientEvent::InputAudioBufferCommit;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"input_audio_buffer.commit"}"#);
    }

    #[test]
    fn test_audio_append() {
        let data = vec![0u8, 1, 2, 3];
        let event = ClientEvent::audio_append(&data);
        match event {
            ClientEvent::InputAudioBufferAppend { audio } => {
                let decoded = BASE64_STANDARD.decode(&audio).unwrap();
                assert_eq!(decoded, data);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_partial_session_update_only_carries_set_fields() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                instructions: Some("Be kind".to_string()),
                ..Default::default()
            },
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"], serde_json::json!({"instructions": "Be kind"}));
    }

    #[test]
    fn test_turn_detection_default_is_server_vad() {
        let json = serde_json::to_value(TurnDetection::default()).unwrap();
        assert_eq!(json["type"], "server_vad");
        assert_eq!(json["prefix_padding_ms"], 300);
        assert_eq!(json["silence_duration_ms"], 500);
    }

    #[test]
    fn test_text_message_content_types() {
        let user = ConversationItem::text_message("user", "Hi");
        assert_eq!(user.content[0].content_type, "input_text");
        let assistant = ConversationItem::text_message("assistant", "Hello");
        assert_eq!(assistant.content[0].content_type, "text");

        let json = serde_json::to_value(ClientEvent::ConversationItemCreate { item: user }).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["role"], "user");
        assert_eq!(json["item"]["content"][0]["text"], "Hi");
    }

    #[test]
    fn test_server_event_deserialization() {
        let json = r#"{
            "type": "error",
            "event_id": "evt_1",
            "error": {
                "type": "invalid_request_error",
                "message": "Test error"
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.message, "Test error");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_unknown_server_event_is_tolerated() {
        let json = r#"{"type": "rate_limits.updated", "rate_limits": []}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn test_transcription_completed_deserialization() {
        let json = r#"{
            "type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_1",
            "content_index": 0,
            "transcript": "I went to the park"
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ServerEvent::TranscriptionCompleted {
                item_id: "item_1".to_string(),
                transcript: "I went to the park".to_string(),
            }
        );
    }

    #[test]
    fn test_decoded_audio_len() {
        for len in 0..10 {
            let data = vec![7u8; len];
            let encoded = BASE64_STANDARD.encode(&data);
            assert_eq!(ServerEvent::decoded_audio_len(&encoded), len);
        }
    }
}
