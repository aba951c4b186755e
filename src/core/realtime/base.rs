//! Base traits and types for the upstream realtime conversation link.
//!
//! The session bridge talks to the upstream API through two seams:
//!
//! - [`UpstreamConnector`] opens a fresh link (one per handshake, so a
//!   reconnect-required settings change simply asks for another one).
//! - [`UpstreamConnection`] is one live link: control messages go out through
//!   `send`, server events come back through `next_event`.
//!
//! # Audio Format
//!
//! Audio frames are PCM 16-bit signed little-endian at 24kHz, base64 encoded
//! inside the JSON events.

use async_trait::async_trait;
use thiserror::Error;

use super::openai::messages::{ClientEvent, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on the upstream realtime link.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the upstream API failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Upstream rejected the credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration (bad URL, missing model)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Handshake did not complete in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The link is gone
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Transport Traits
// =============================================================================

/// One live link to the upstream conversation API.
///
/// `send` takes `&self` so the configurator and history injector can share
/// the link while the handler keeps exclusive access to the event stream.
#[async_trait]
pub trait UpstreamConnection: Send + Sync {
    /// Queue a control message for the upstream API.
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()>;

    /// Wait for the next server event. Returns `None` once the link is closed.
    ///
    /// Cancel safe: dropping the future never loses an event.
    async fn next_event(&mut self) -> Option<ServerEvent>;

    /// Close the link. Further `send` calls fail with `NotConnected`.
    async fn close(&mut self);
}

/// Factory for upstream links.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open a new link authenticated with `api_key`.
    async fn connect(&self, api_key: &str) -> RealtimeResult<Box<dyn UpstreamConnection>>;
}

// =============================================================================
// Test Support
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(RealtimeError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            RealtimeError::AuthenticationFailed("401".to_string()).to_string(),
            "Authentication failed: 401"
        );
    }
}
