//! Configuration module for the tutoring gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use tutor_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::realtime::openai::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL};
use crate::core::session::WpmSettings;
use crate::core::tutor::{DEFAULT_CHAT_MODEL, OPENAI_API_BASE};

pub use yaml::YamlConfig;

/// Server configuration
///
/// Holds everything the gateway needs at startup. The upstream API key is
/// zeroized when the configuration is dropped and never printed.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Key for both the realtime link and the chat completions API
    pub openai_api_key: Option<String>,
    pub realtime_model: String,
    pub realtime_url: String,
    pub api_base: String,
    pub chat_model: String,

    /// Base tutor prompt; a built-in prompt is used when the file is missing
    pub system_prompt_path: PathBuf,

    pub wpm_slow_threshold: f64,
    pub wpm_fast_threshold: f64,
    pub wpm_window_secs: u64,
    pub wpm_sample_interval_ms: u64,

    /// Feedback runs only when a saved report stores more messages than this
    pub feedback_min_messages: usize,

    /// `*` for any origin, a comma-separated list, or `None` for same-origin only
    pub cors_allowed_origins: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("realtime_model", &self.realtime_model)
            .field("realtime_url", &self.realtime_url)
            .field("api_base", &self.api_base)
            .field("chat_model", &self.chat_model)
            .field("system_prompt_path", &self.system_prompt_path)
            .field("wpm_slow_threshold", &self.wpm_slow_threshold)
            .field("wpm_fast_threshold", &self.wpm_fast_threshold)
            .field("wpm_window_secs", &self.wpm_window_secs)
            .field("wpm_sample_interval_ms", &self.wpm_sample_interval_ms)
            .field("feedback_min_messages", &self.feedback_min_messages)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::DEFAULT_HOST.to_string(),
            port: env::DEFAULT_PORT,
            openai_api_key: None,
            realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            api_base: OPENAI_API_BASE.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            system_prompt_path: PathBuf::from(env::DEFAULT_SYSTEM_PROMPT_PATH),
            wpm_slow_threshold: env::DEFAULT_WPM_SLOW,
            wpm_fast_threshold: env::DEFAULT_WPM_FAST,
            wpm_window_secs: env::DEFAULT_WPM_WINDOW_SECS,
            wpm_sample_interval_ms: env::DEFAULT_WPM_SAMPLE_INTERVAL_MS,
            feedback_min_messages: env::DEFAULT_FEEDBACK_MIN_MESSAGES,
            cors_allowed_origins: None,
        }
    }
}

/// Implement Drop to zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a numeric variable cannot be parsed or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_wpm(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base values
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs before this runs
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate_wpm(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Speaking-rate monitor settings for each session.
    pub fn wpm_settings(&self) -> WpmSettings {
        WpmSettings {
            slow_threshold: self.wpm_slow_threshold,
            fast_threshold: self.wpm_fast_threshold,
            window: Duration::from_secs(self.wpm_window_secs),
            sample_interval: Duration::from_millis(self.wpm_sample_interval_ms),
        }
    }
}
