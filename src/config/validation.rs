//! Configuration validation.

use super::ServerConfig;

/// Reject combinations the session layer cannot run with.
pub(crate) fn validate_wpm(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.wpm_slow_threshold >= config.wpm_fast_threshold {
        return Err(format!(
            "WPM slow threshold ({}) must be below the fast threshold ({})",
            config.wpm_slow_threshold, config.wpm_fast_threshold
        )
        .into());
    }
    if config.wpm_window_secs == 0 {
        return Err("WPM window must be at least one second".into());
    }
    if config.wpm_sample_interval_ms == 0 {
        return Err("WPM sample interval must be positive".into());
    }
    Ok(())
}
