//! Shared application state.

use std::sync::Arc;

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::ServerConfig;
use crate::core::realtime::{OpenAIRealtimeConnector, UpstreamConnector};
use crate::core::session::{SessionRegistry, load_base_prompt};
use crate::core::store::{InMemorySessionStore, PersistenceTrigger, SessionStore};
use crate::core::tutor::{FeedbackGenerator, HintGenerator, OpenAiChatClient};

/// Application state shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Base tutor persona, read once at startup
    pub base_prompt: String,
    /// Sessions with an active client connection
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn SessionStore>,
    pub connector: Arc<dyn UpstreamConnector>,
    /// `None` when no API key is configured
    pub hints: Option<Arc<dyn HintGenerator>>,
    pub persistence: PersistenceTrigger,
}

/// Pluggable backends for [`AppState::with_collaborators`].
pub struct Collaborators {
    pub store: Arc<dyn SessionStore>,
    pub connector: Arc<dyn UpstreamConnector>,
    pub hints: Option<Arc<dyn HintGenerator>>,
    pub feedback: Option<Arc<dyn FeedbackGenerator>>,
}

impl AppState {
    /// Production state: OpenAI upstream, in-memory store, chat-completions
    /// collaborators when a key is configured.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let base_prompt = load_base_prompt(&config.system_prompt_path);

        let connector: Arc<dyn UpstreamConnector> = Arc::new(OpenAIRealtimeConnector::new(
            config.realtime_url.clone(),
            config.realtime_model.clone(),
        ));

        let chat = match config.openai_api_key.as_deref() {
            Some(key) => {
                match OpenAiChatClient::new(key, config.api_base.clone(), config.chat_model.clone())
                {
                    Ok(client) => {
                        info!(model = client.model(), "Hints and feedback enabled");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        warn!("Chat client unavailable, hints and feedback disabled: {}", e);
                        None
                    }
                }
            }
            None => {
                warn!("OPENAI_API_KEY not set; sessions will be refused");
                None
            }
        };

        let collaborators = Collaborators {
            store: Arc::new(InMemorySessionStore::new()),
            connector,
            hints: chat.clone().map(|c| c as Arc<dyn HintGenerator>),
            feedback: chat.map(|c| c as Arc<dyn FeedbackGenerator>),
        };

        info!(
            realtime_model = %config.realtime_model,
            chat_model = %config.chat_model,
            "Application state initialized"
        );
        Self::with_collaborators(config, base_prompt, collaborators)
    }

    /// State with explicit backends, used by tests and embedders.
    pub fn with_collaborators(
        config: ServerConfig,
        base_prompt: String,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        let persistence = PersistenceTrigger::new(
            collaborators.store.clone(),
            collaborators.feedback,
            config.feedback_min_messages,
        );
        Arc::new(Self {
            config,
            base_prompt,
            registry: Arc::new(SessionRegistry::new()),
            store: collaborators.store,
            connector: collaborators.connector,
            hints: collaborators.hints,
            persistence,
        })
    }

    /// Upstream credential for a new session.
    pub fn api_key(&self) -> Option<Zeroizing<String>> {
        self.config
            .openai_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Zeroizing::new(key.clone()))
    }
}
