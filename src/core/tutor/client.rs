//! Minimal chat-completions client.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use zeroize::Zeroize;

use super::{TutorError, TutorResult};

/// Default REST base of the OpenAI API.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default model for hints and feedback.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}

/// Chat-completions client shared by the hint and feedback generators.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Drop for OpenAiChatClient {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl OpenAiChatClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> TutorResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| TutorError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Run one system + user exchange and parse the reply as a JSON object.
    pub async fn complete_json(&self, system: &str, user: &str) -> TutorResult<Value> {
        if self.api_key.is_empty() {
            return Err(TutorError::MissingCredential);
        }

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorError::Request(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TutorError::Request(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(err) => format!("{} ({})", err.error.message, err.error.error_type),
                Err(_) => text,
            };
            return Err(TutorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| TutorError::InvalidResponse(format!("Bad completion body: {e}")))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TutorError::InvalidResponse("Empty completion".to_string()))?;

        debug!(model = %self.model, chars = content.len(), "Chat completion received");
        serde_json::from_str(&content)
            .map_err(|e| TutorError::InvalidResponse(format!("Reply is not JSON: {e}")))
    }
}
