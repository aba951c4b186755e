//! OpenAI Realtime API module.
//!
//! Bidirectional audio with the OpenAI Realtime API: learner audio is appended
//! to the input buffer, server VAD decides turns, and the model answers with
//! audio plus a transcript.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.
//! G.711 u-law and a-law are also supported at 8kHz.
//!
//! # Example
//!
//! ```rust,ignore
//! use tutor_gateway::core::realtime::{OpenAIRealtimeConnector, UpstreamConnector};
//! use tutor_gateway::core::realtime::openai::ClientEvent;
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = OpenAIRealtimeConnector::default();
//!     let mut link = connector.connect("sk-...").await.unwrap();
//!
//!     link.send(ClientEvent::ResponseCreate).await.unwrap();
//!     while let Some(event) = link.next_event().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

mod client;
mod config;
pub mod messages;

pub use client::{OpenAIRealtimeConnection, OpenAIRealtimeConnector};
pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL,
    OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, default_session_config,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, InputAudioTranscription, ServerEvent,
    Session, SessionConfig, TurnDetection,
};
