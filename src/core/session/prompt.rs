//! Layered instruction assembly.
//!
//! Three layers make up the instructions sent upstream, always in this order:
//!
//! 1. base persona, loaded once at startup and never modified
//! 2. the learner's own requirement, set from client `session.update` messages
//! 3. a dynamic adjustment computed from the learner's speaking rate
//!
//! Empty layers are omitted entirely.

use std::path::Path;

use tracing::{info, warn};

/// Label introducing the learner-requested layer.
pub const USER_LAYER_LABEL: &str = "[User Requirement]";

/// Label introducing the rate-adaptation layer.
pub const DYNAMIC_LAYER_LABEL: &str = "[Dynamic Adjustment]";

/// Persona used when the prompt file cannot be read.
pub const DEFAULT_BASE_PROMPT: &str =
    "You are a helpful and friendly English tutor named 'Malang'. Speak naturally.";

/// Holds the three instruction layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    base: String,
    active_user: String,
    dynamic: String,
}

impl PromptAssembler {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            active_user: String::new(),
            dynamic: String::new(),
        }
    }

    pub fn active_user(&self) -> &str {
        &self.active_user
    }

    pub fn dynamic(&self) -> &str {
        &self.dynamic
    }

    /// Replace the learner-requested layer. Callers push the result upstream.
    pub fn set_active_user(&mut self, text: impl Into<String>) {
        self.active_user = text.into();
    }

    /// Replace the rate-adaptation layer. Callers push the result upstream.
    pub fn set_dynamic(&mut self, text: impl Into<String>) {
        self.dynamic = text.into();
    }

    /// Compose the instruction text from the current layers.
    pub fn assemble(&self) -> String {
        let mut out = self.base.clone();
        if !self.active_user.is_empty() {
            out.push_str("\n\n");
            out.push_str(USER_LAYER_LABEL);
            out.push('\n');
            out.push_str(&self.active_user);
        }
        if !self.dynamic.is_empty() {
            out.push_str("\n\n");
            out.push_str(DYNAMIC_LAYER_LABEL);
            out.push('\n');
            out.push_str(&self.dynamic);
        }
        out
    }
}

/// Read the base persona from `path`, falling back to [`DEFAULT_BASE_PROMPT`].
pub fn load_base_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            info!(path = %path.display(), "Loaded system prompt");
            text.trim().to_string()
        }
        Ok(_) => {
            warn!(path = %path.display(), "System prompt file is empty, using default");
            DEFAULT_BASE_PROMPT.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), "System prompt not readable ({}), using default", e);
            DEFAULT_BASE_PROMPT.to_string()
        }
    }
}
