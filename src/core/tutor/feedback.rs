//! Post-session feedback on the learner's mistakes.

use async_trait::async_trait;
use tracing::info;

use super::client::OpenAiChatClient;
use super::{FeedbackGenerator, SessionFeedback, TutorError, TutorResult};
use crate::core::session::Role;
use crate::core::store::StoredMessage;

const FEEDBACK_SYSTEM_PROMPT: &str = "You review an English learning conversation between a \
learner and a tutor. Find errors in the learner's grammar, tense, vocabulary and expressions. \
Only learner messages may be corrected, referenced by the id in parentheses. Reply with a JSON \
object: {\"summary\": \"...\", \"corrections\": [{\"message_id\": 1, \"feedback\": \"corrected \
sentence\", \"reason\": \"short explanation\"}]}.";

/// Render messages as `[learner] (id) text` / `[tutor] (id) text` lines.
pub fn format_feedback_conversation(messages: &[StoredMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "learner",
                Role::Assistant => "tutor",
            };
            format!("[{speaker}] ({}) {}", m.id, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl FeedbackGenerator for OpenAiChatClient {
    async fn generate_feedback(&self, messages: &[StoredMessage]) -> TutorResult<SessionFeedback> {
        let user = format!(
            "Analyze the following English learning conversation:\n\n{}",
            format_feedback_conversation(messages)
        );
        let value = self.complete_json(FEEDBACK_SYSTEM_PROMPT, &user).await?;
        let mut feedback: SessionFeedback = serde_json::from_value(value)
            .map_err(|e| TutorError::InvalidResponse(format!("Bad feedback shape: {e}")))?;

        // Corrections may only point at learner messages of this batch.
        feedback.corrections.retain(|c| {
            messages
                .iter()
                .any(|m| m.id == c.message_id && m.role == Role::User)
        });
        info!(corrections = feedback.corrections.len(), "Generated session feedback");
        Ok(feedback)
    }
}
