//! Reply hints for a learner who is stuck.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::client::OpenAiChatClient;
use super::{HintGenerator, TutorError, TutorResult};
use crate::core::session::{Role, ScenarioContext, TranscriptEntry};

/// Upper bound on returned hints.
pub const MAX_HINTS: usize = 3;

const HINT_SYSTEM_PROMPT: &str = "You help an English learner continue a role-play conversation \
with a tutor. Suggest three short, natural sentences the learner could say next, in English, \
appropriate to the scenario. Reply with a JSON object of the form {\"hints\": [\"...\", \"...\", \"...\"]}.";

/// Render the transcript as `Learner:` / `Tutor:` lines.
pub fn format_conversation(transcript: &[TranscriptEntry]) -> String {
    transcript
        .iter()
        .map(|entry| {
            let speaker = match entry.role {
                Role::User => "Learner",
                Role::Assistant => "Tutor",
            };
            format!("{speaker}: {}", entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the scenario under a `Scenario context:` header. Empty when no
/// field is set.
pub fn format_scenario_context(context: Option<&ScenarioContext>) -> String {
    let Some(context) = context else {
        return String::new();
    };
    let parts: Vec<String> = [
        ("Topic", &context.title),
        ("Place", &context.place),
        ("Speaking with", &context.partner),
        ("Goal", &context.goal),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(|v| format!("{label}: {v}"))
    })
    .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("Scenario context:\n{}", parts.join("\n"))
    }
}

/// Accepts `{"hints": [...]}` or a bare array.
fn parse_hints(value: Value) -> TutorResult<Vec<String>> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("hints") {
            Some(Value::Array(items)) => items,
            _ => return Err(TutorError::InvalidResponse("Missing hints array".to_string())),
        },
        _ => return Err(TutorError::InvalidResponse("Unexpected hints shape".to_string())),
    };
    Ok(list
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .take(MAX_HINTS)
        .collect())
}

#[async_trait]
impl HintGenerator for OpenAiChatClient {
    async fn generate_hints(
        &self,
        transcript: &[TranscriptEntry],
        context: Option<&ScenarioContext>,
    ) -> TutorResult<Vec<String>> {
        if transcript.is_empty() {
            return Ok(Vec::new());
        }

        let scenario = format_scenario_context(context);
        let system = if scenario.is_empty() {
            HINT_SYSTEM_PROMPT.to_string()
        } else {
            format!("{HINT_SYSTEM_PROMPT}\n\n{scenario}")
        };
        let user = format!("Conversation so far:\n{}", format_conversation(transcript));

        let hints = parse_hints(self.complete_json(&system, &user).await?)?;
        if hints.is_empty() {
            warn!("Hint reply contained no usable hints");
        } else {
            info!(count = hints.len(), "Generated hints");
        }
        Ok(hints)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::core::tutor::DEFAULT_CHAT_MODEL;

    fn transcript() -> Vec<TranscriptEntry> {
        vec![
            TranscriptEntry::new(Role::Assistant, "What would you like to order?", 1.0),
            TranscriptEntry::new(Role::User, "I want a coffee", 1.2),
        ]
    }

    #[test]
    fn test_format_conversation() {
        assert_eq!(
            format_conversation(&transcript()),
            "Tutor: What would you like to order?\nLearner: I want a coffee"
        );
    }

    #[test]
    fn test_format_scenario_context() {
        let context = ScenarioContext {
            title: Some("Ordering coffee".to_string()),
            place: Some("Cafe".to_string()),
            partner: None,
            goal: Some("Order a latte".to_string()),
        };
        assert_eq!(
            format_scenario_context(Some(&context)),
            "Scenario context:\nTopic: Ordering coffee\nPlace: Cafe\nGoal: Order a latte"
        );
        assert_eq!(format_scenario_context(Some(&ScenarioContext::default())), "");
        assert_eq!(format_scenario_context(None), "");
    }

    #[test]
    fn test_parse_hints_truncates() {
        let hints = parse_hints(json!({"hints": ["a", "b", "", "c", "d"]})).unwrap();
        assert_eq!(hints, ["a", "b", "c"]);
        assert_eq!(parse_hints(json!(["x"])).unwrap(), ["x"]);
        assert!(parse_hints(json!({"other": 1})).is_err());
    }

    #[tokio::test]
    async fn test_generate_hints() {
        let server = MockServer::start().await;
        let reply = json!({"hints": ["Can I get a latte?", "Do you have oat milk?", "How much is it?", "Thanks!"]});
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Learner: I want a coffee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": reply.to_string()}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new("sk-test", server.uri(), DEFAULT_CHAT_MODEL).unwrap();
        let hints = client.generate_hints(&transcript(), None).await.unwrap();
        assert_eq!(hints.len(), MAX_HINTS);
        assert_eq!(hints[0], "Can I get a latte?");
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new("sk-test", server.uri(), DEFAULT_CHAT_MODEL).unwrap();
        assert!(client.generate_hints(&[], None).await.unwrap().is_empty());
    }
}
