pub mod realtime;
pub mod session;
pub mod store;
pub mod tutor;

// Re-export commonly used types for convenience
pub use realtime::{RealtimeError, RealtimeResult, UpstreamConnection, UpstreamConnector};
pub use session::{LiveSession, SessionRegistry, SessionReport, TranscriptEntry};
pub use store::{InMemorySessionStore, PersistenceTrigger, SessionStore, StoreError};
pub use tutor::{FeedbackGenerator, HintGenerator, TutorError};
