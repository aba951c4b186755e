//! YAML overrides on top of the environment configuration.

use std::path::PathBuf;

use super::ServerConfig;
use super::env::load_from_env;
use super::yaml::YamlConfig;

/// Environment configuration with optional YAML overrides on top.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml);
    }
    Ok(config)
}

/// Apply every value present in `yaml` onto `config`.
fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(openai) = yaml.openai {
        if let Some(key) = openai.api_key {
            config.openai_api_key = Some(key);
        }
        if let Some(model) = openai.realtime_model {
            config.realtime_model = model;
        }
        if let Some(url) = openai.realtime_url {
            config.realtime_url = url;
        }
        if let Some(base) = openai.api_base {
            config.api_base = base;
        }
        if let Some(model) = openai.chat_model {
            config.chat_model = model;
        }
    }

    if let Some(path) = yaml.prompt.and_then(|p| p.system_prompt_path) {
        config.system_prompt_path = PathBuf::from(path);
    }

    if let Some(wpm) = yaml.wpm {
        if let Some(slow) = wpm.slow_threshold {
            config.wpm_slow_threshold = slow;
        }
        if let Some(fast) = wpm.fast_threshold {
            config.wpm_fast_threshold = fast;
        }
        if let Some(window) = wpm.window_secs {
            config.wpm_window_secs = window;
        }
        if let Some(interval) = wpm.sample_interval_ms {
            config.wpm_sample_interval_ms = interval;
        }
    }

    if let Some(min) = yaml.feedback.and_then(|f| f.min_messages) {
        config.feedback_min_messages = min;
    }

    if let Some(origins) = yaml.security.and_then(|s| s.cors_allowed_origins) {
        config.cors_allowed_origins = Some(origins);
    }
}
