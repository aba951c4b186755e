//! Upstream realtime conversation module.
//!
//! # Architecture
//!
//! - `UpstreamConnector` / `UpstreamConnection` traits abstract the transport
//! - `openai` implements them over the OpenAI Realtime WebSocket API
//!
//! The session layer only ever emits `session.update` and
//! `conversation.item.create` control messages of its own, plus the audio and
//! response events it relays for the learner.

mod base;
pub mod openai;

pub use base::{RealtimeError, RealtimeResult, UpstreamConnection, UpstreamConnector};
pub use openai::{OpenAIRealtimeConnection, OpenAIRealtimeConnector};

#[cfg(test)]
pub(crate) use base::testing;
