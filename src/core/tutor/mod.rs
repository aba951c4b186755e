//! LLM collaborators: live reply hints and post-session feedback.
//!
//! Both are plain request/response calls against a chat-completions API and
//! sit behind traits so the handler and REST layer can be tested without a
//! network.

mod client;
mod feedback;
mod hints;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::session::{ScenarioContext, TranscriptEntry};
use crate::core::store::StoredMessage;

pub use client::{DEFAULT_CHAT_MODEL, OPENAI_API_BASE, OpenAiChatClient};
pub use feedback::format_feedback_conversation;
pub use hints::{MAX_HINTS, format_conversation, format_scenario_context};

/// Errors from the LLM collaborators.
#[derive(Debug, Error)]
pub enum TutorError {
    #[error("Missing API credential")]
    MissingCredential,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type TutorResult<T> = Result<T, TutorError>;

/// Suggests what the learner could say next.
#[async_trait]
pub trait HintGenerator: Send + Sync {
    /// At most [`MAX_HINTS`] suggestions. An empty transcript yields none.
    async fn generate_hints(
        &self,
        transcript: &[TranscriptEntry],
        context: Option<&ScenarioContext>,
    ) -> TutorResult<Vec<String>>;
}

/// Reviews a finished conversation.
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    async fn generate_feedback(&self, messages: &[StoredMessage]) -> TutorResult<SessionFeedback>;
}

/// Review of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFeedback {
    pub summary: String,
    #[serde(default)]
    pub corrections: Vec<MessageCorrection>,
}

/// Correction attached to one learner message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCorrection {
    pub message_id: u64,
    pub feedback: String,
    #[serde(default)]
    pub reason: Option<String>,
}
