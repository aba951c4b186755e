//! Per-session conversation state.
//!
//! - `prompt`: the three instruction layers
//! - `configurator`: upstream settings and `session.update` generation
//! - `history`: replay of prior turns on a fresh link
//! - `wpm`: learner speaking-rate classification
//! - `live` / `registry`: the shared view of connected sessions
//! - `transcript`: transcript entries and the end-of-session report

pub mod configurator;
pub mod history;
pub mod live;
pub mod prompt;
pub mod registry;
pub mod transcript;
pub mod wpm;

pub use configurator::{RECONNECT_KEYS, UpdateOutcome, UpstreamSessionConfigurator};
pub use history::inject_history;
pub use live::LiveSession;
pub use prompt::{DEFAULT_BASE_PROMPT, PromptAssembler, load_base_prompt};
pub use registry::{RegistryGuard, SessionRegistry};
pub use transcript::{HistoryEntry, Role, ScenarioContext, SessionReport, TranscriptEntry};
pub use wpm::{WpmMonitor, WpmSettings, WpmStatus};
