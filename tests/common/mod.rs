//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use tutor_gateway::ServerConfig;
use tutor_gateway::core::realtime::openai::{ClientEvent, ServerEvent};
use tutor_gateway::core::realtime::{
    RealtimeError, RealtimeResult, UpstreamConnection, UpstreamConnector,
};
use tutor_gateway::core::store::{InMemorySessionStore, SessionStore};
use tutor_gateway::core::tutor::{FeedbackGenerator, HintGenerator};
use tutor_gateway::handlers::realtime::messages::{
    ClientChannel, ClientEndpoint, ClientFrame, ClientRoute, ServerMessage,
};
use tutor_gateway::state::{AppState, Collaborators};

pub const WAIT: Duration = Duration::from_secs(3);

// =============================================================================
// Scripted upstream
// =============================================================================

/// One control message as seen by the upstream, tagged with its link.
#[derive(Debug, Clone)]
pub struct Sent {
    pub link: usize,
    pub event: ClientEvent,
}

/// Test side of one scripted link. Dropping it closes the link.
pub struct UpstreamHandle {
    pub link: usize,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl UpstreamHandle {
    pub fn push(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push(serde_json::from_value(value).expect("valid server event"));
    }
}

struct PendingLink {
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Connector handing out pre-scripted links in order. Connecting with no
/// link left fails like a refused handshake.
#[derive(Default)]
pub struct ScriptedConnector {
    pending: Mutex<VecDeque<PendingLink>>,
    sent: Arc<Mutex<Vec<Sent>>>,
    keys: Mutex<Vec<String>>,
    scripted: AtomicUsize,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the next link the handler will open.
    pub fn add_link(&self) -> UpstreamHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().push_back(PendingLink { events: rx });
        UpstreamHandle {
            link: self.scripted.fetch_add(1, Ordering::SeqCst),
            events: tx,
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn sent_on(&self, link: usize) -> Vec<ClientEvent> {
        self.sent
            .lock()
            .iter()
            .filter(|s| s.link == link)
            .map(|s| s.event.clone())
            .collect()
    }

    /// Wait until `pred` holds for the events sent so far.
    pub async fn wait_for(&self, pred: impl Fn(&[Sent]) -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            if pred(&self.sent.lock()) {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("upstream condition not met; sent: {:#?}", self.sent());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl UpstreamConnector for ScriptedConnector {
    async fn connect(&self, api_key: &str) -> RealtimeResult<Box<dyn UpstreamConnection>> {
        self.keys.lock().push(api_key.to_string());
        let link = self.connects.fetch_add(1, Ordering::SeqCst);
        let Some(pending) = self.pending.lock().pop_front() else {
            return Err(RealtimeError::ConnectionFailed(
                "no scripted link".to_string(),
            ));
        };
        Ok(Box::new(ScriptedConnection {
            link,
            sent: self.sent.clone(),
            events: pending.events,
            closed: AtomicBool::new(false),
        }))
    }
}

struct ScriptedConnection {
    link: usize,
    sent: Arc<Mutex<Vec<Sent>>>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    closed: AtomicBool,
}

#[async_trait]
impl UpstreamConnection for ScriptedConnection {
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::NotConnected);
        }
        self.sent.lock().push(Sent {
            link: self.link,
            event,
        });
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.events.close();
    }
}

// =============================================================================
// Channel client
// =============================================================================

/// Learner side of a [`ClientChannel`].
pub struct TestClient {
    pub frames: mpsc::Sender<ClientFrame>,
    pub routes: mpsc::Receiver<ClientRoute>,
}

impl TestClient {
    pub fn pair() -> (ClientChannel, TestClient) {
        let (channel, ClientEndpoint { frames, routes }) = ClientChannel::pair(256);
        (channel, TestClient { frames, routes })
    }

    pub async fn send_json(&self, value: serde_json::Value) {
        self.frames
            .send(ClientFrame::Text(value.to_string()))
            .await
            .expect("handler is listening");
    }

    pub async fn hang_up(&self) {
        let _ = self.frames.send(ClientFrame::Close).await;
    }

    pub async fn next_route(&mut self) -> ClientRoute {
        tokio::time::timeout(WAIT, self.routes.recv())
            .await
            .expect("timed out waiting for the handler")
            .expect("handler dropped the client channel")
    }

    /// Next JSON message; panics on a close frame.
    pub async fn next_message(&mut self) -> ServerMessage {
        match self.next_route().await {
            ClientRoute::Outgoing(message) => message,
            ClientRoute::Close { code, reason } => {
                panic!("unexpected close {code}: {reason}")
            }
        }
    }

    /// Skip messages until one matches `pred`.
    pub async fn wait_for(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let message = self.next_message().await;
            if pred(&message) {
                return message;
            }
        }
    }

    /// Skip messages until the close frame arrives.
    pub async fn closed(&mut self) -> (u16, String) {
        loop {
            if let ClientRoute::Close { code, reason } = self.next_route().await {
                return (code, reason);
            }
        }
    }
}

// =============================================================================
// Application state
// =============================================================================

/// Configuration with a credential and a sampler that never fires.
pub fn test_config(api_key: Option<&str>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.openai_api_key = api_key.map(str::to_string);
    config.wpm_sample_interval_ms = 3_600_000;
    config
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub connector: Arc<ScriptedConnector>,
    pub store: Arc<InMemorySessionStore>,
}

impl Harness {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_tutors(config, None, None)
    }

    pub fn with_tutors(
        config: ServerConfig,
        hints: Option<Arc<dyn HintGenerator>>,
        feedback: Option<Arc<dyn FeedbackGenerator>>,
    ) -> Self {
        let connector = ScriptedConnector::new();
        let store = Arc::new(InMemorySessionStore::new());
        let state = AppState::with_collaborators(
            config,
            "You are a friendly tutor.".to_string(),
            Collaborators {
                store: store.clone() as Arc<dyn SessionStore>,
                connector: connector.clone(),
                hints,
                feedback,
            },
        );
        Self {
            state,
            connector,
            store,
        }
    }
}
