//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::ServerConfig;
use crate::core::realtime::openai::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL};
use crate::core::tutor::{DEFAULT_CHAT_MODEL, OPENAI_API_BASE};

pub(crate) const DEFAULT_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: u16 = 8000;
pub(crate) const DEFAULT_SYSTEM_PROMPT_PATH: &str = "prompts/system_instruction.md";
pub(crate) const DEFAULT_WPM_SLOW: f64 = 90.0;
pub(crate) const DEFAULT_WPM_FAST: f64 = 150.0;
pub(crate) const DEFAULT_WPM_WINDOW_SECS: u64 = 60;
pub(crate) const DEFAULT_WPM_SAMPLE_INTERVAL_MS: u64 = 3000;
pub(crate) const DEFAULT_FEEDBACK_MIN_MESSAGES: usize = 10;

/// Non-empty value of `key`.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key` if set, otherwise `default`.
fn parse_var<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value for {key}: {e}").into()),
        None => Ok(default),
    }
}

/// Build a configuration from environment variables and defaults.
pub(crate) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_var("PORT", DEFAULT_PORT)?,
        openai_api_key: var("OPENAI_API_KEY"),
        realtime_model: var("OPENAI_REALTIME_MODEL")
            .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        realtime_url: var("OPENAI_REALTIME_URL").unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        api_base: var("OPENAI_API_BASE").unwrap_or_else(|| OPENAI_API_BASE.to_string()),
        chat_model: var("OPENAI_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        system_prompt_path: PathBuf::from(
            var("SYSTEM_PROMPT_PATH").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT_PATH.to_string()),
        ),
        wpm_slow_threshold: parse_var("WPM_SLOW_THRESHOLD", DEFAULT_WPM_SLOW)?,
        wpm_fast_threshold: parse_var("WPM_FAST_THRESHOLD", DEFAULT_WPM_FAST)?,
        wpm_window_secs: parse_var("WPM_WINDOW_SECS", DEFAULT_WPM_WINDOW_SECS)?,
        wpm_sample_interval_ms: parse_var(
            "WPM_SAMPLE_INTERVAL_MS",
            DEFAULT_WPM_SAMPLE_INTERVAL_MS,
        )?,
        feedback_min_messages: parse_var("FEEDBACK_MIN_MESSAGES", DEFAULT_FEEDBACK_MIN_MESSAGES)?,
        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
    })
}
