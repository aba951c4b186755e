use thiserror::Error;

use crate::core::realtime::RealtimeError;

/// Close code for a missing server-side credential.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Close code when the upstream link could not be set up.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// Close code for an ownership mismatch.
pub const CLOSE_UNAUTHORIZED: u16 = 4003;
/// Close code for an unknown session id.
pub const CLOSE_SESSION_NOT_FOUND: u16 = 4004;

/// Failures before a session becomes active. Each one closes the client
/// connection with its own status code and produces no report.
#[derive(Debug, Error)]
pub enum SessionSetupError {
    #[error("Server configuration error")]
    MissingCredential,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Unauthorized access to this session")]
    Unauthorized,

    #[error("Upstream connection failed: {0}")]
    UpstreamHandshake(#[from] RealtimeError),
}

impl SessionSetupError {
    pub fn close_code(&self) -> u16 {
        match self {
            Self::MissingCredential => CLOSE_POLICY_VIOLATION,
            Self::SessionNotFound => CLOSE_SESSION_NOT_FOUND,
            Self::Unauthorized => CLOSE_UNAUTHORIZED,
            Self::UpstreamHandshake(_) => CLOSE_INTERNAL_ERROR,
        }
    }

    /// Reason text sent with the close frame.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Server configuration error",
            Self::SessionNotFound => "Session not found",
            Self::Unauthorized => "Unauthorized access to this session",
            Self::UpstreamHandshake(_) => "Upstream connection failed",
        }
    }
}
