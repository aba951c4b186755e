//! Tutoring WebSocket handlers
//!
//! Each connection bridges one learner client to one upstream realtime
//! conversation. The learner speaks, the tutor answers, and the gateway keeps
//! a timed transcript that becomes the session report on close.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **input_audio_buffer.append**: Base64 PCM16 audio
//! - **input_audio_buffer.commit** / **input_audio_buffer.clear**
//! - **response.create**: Ask the tutor to respond
//! - **text**: Typed learner turn
//! - **session.update**: Change voice, turn detection or instructions
//! - **disconnect**: End the session
//! - **Binary frames**: Raw PCM16 audio (24kHz, mono)
//!
//! ## Server → Client
//!
//! - **ready**: Upstream configured, relay live
//! - **audio.delta** / **audio.done**: Tutor audio
//! - **transcript.done** / **user.transcript**: Final transcripts
//! - **speech.started** / **speech.stopped**: Upstream VAD events
//! - **debug.state**: Speaking-rate status change
//! - **error**: Error message
//! - **disconnected**: Session ended, with the report

pub mod connection;
mod handler;
pub mod messages;

pub use connection::{CloseReason, ConnectionHandler, HandlerSettings, HandlerState};
pub use handler::{
    SessionQuery, SessionRequest, chat_handler, demo_chat_handler, guest_chat_handler,
    run_session,
};
