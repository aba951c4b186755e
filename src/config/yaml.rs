use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///
/// openai:
///   api_key: "sk-..."
///   realtime_model: "gpt-4o-realtime-preview"
///   realtime_url: "wss://api.openai.com/v1/realtime"
///   api_base: "https://api.openai.com/v1"
///   chat_model: "gpt-4o-mini"
///
/// prompt:
///   system_prompt_path: "prompts/system_instruction.md"
///
/// wpm:
///   slow_threshold: 90
///   fast_threshold: 150
///   window_secs: 60
///   sample_interval_ms: 3000
///
/// feedback:
///   min_messages: 10
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAiYaml>,
    pub prompt: Option<PromptYaml>,
    pub wpm: Option<WpmYaml>,
    pub feedback: Option<FeedbackYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Upstream API settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAiYaml {
    pub api_key: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_url: Option<String>,
    pub api_base: Option<String>,
    pub chat_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PromptYaml {
    pub system_prompt_path: Option<String>,
}

/// Speaking-rate monitor settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WpmYaml {
    pub slow_threshold: Option<f64>,
    pub fast_threshold: Option<f64>,
    pub window_secs: Option<u64>,
    pub sample_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FeedbackYaml {
    /// Feedback runs only when a report stores more messages than this
    pub min_messages: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// `*` or a comma-separated origin list
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
