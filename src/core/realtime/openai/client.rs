//! OpenAI Realtime API client implementation.
//!
//! [`OpenAIRealtimeConnector`] performs the WebSocket handshake and hands back
//! an [`OpenAIRealtimeConnection`]. A spawned task owns the socket: outgoing
//! [`ClientEvent`]s arrive on one channel, parsed [`ServerEvent`]s leave on
//! another. When the socket ends the event channel closes, which is how the
//! session handler notices upstream loss.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use super::config::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL};
use super::messages::{ClientEvent, ServerEvent};
use crate::core::realtime::base::{
    RealtimeError, RealtimeResult, UpstreamConnection, UpstreamConnector,
};

/// Channel capacity for outgoing control messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for parsed server events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for a graceful close before the socket task is aborted.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Connector
// =============================================================================

/// Opens links to the OpenAI Realtime API.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeConnector {
    base_url: String,
    model: String,
}

impl Default for OpenAIRealtimeConnector {
    fn default() -> Self {
        Self::new(OPENAI_REALTIME_URL, DEFAULT_REALTIME_MODEL)
    }
}

impl OpenAIRealtimeConnector {
    /// Create a connector for `model` at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Build the WebSocket URL with model parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", self.base_url, self.model)
    }

    fn build_request(&self, api_key: &str) -> RealtimeResult<http::Request<()>> {
        let ws_url = self.ws_url();
        let parsed = url::Url::parse(&ws_url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("{ws_url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "{ws_url}: missing host"
                )));
            }
        };

        http::Request::builder()
            .uri(&ws_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))
    }
}

#[async_trait]
impl UpstreamConnector for OpenAIRealtimeConnector {
    async fn connect(&self, api_key: &str) -> RealtimeResult<Box<dyn UpstreamConnection>> {
        if api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let request = self.build_request(api_key)?;
        info!(model = %self.model, "Connecting to OpenAI Realtime API");

        let (ws_stream, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| RealtimeError::Timeout("WebSocket handshake".to_string()))?
                .map_err(|e| match e {
                    tungstenite::Error::Http(response)
                        if response.status() == http::StatusCode::UNAUTHORIZED =>
                    {
                        RealtimeError::AuthenticationFailed("upstream returned 401".to_string())
                    }
                    other => RealtimeError::ConnectionFailed(other.to_string()),
                })?;

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel::<ServerEvent>(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = outgoing_rx.recv() => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            break;
                        }
                    }

                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(ServerEvent::Unknown) => {}
                                    Ok(event) => {
                                        if events_tx.send(event).await.is_err() {
                                            debug!("Event receiver dropped, stopping upstream task");
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        warn!("Failed to parse server event: {} - {}", e, text);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                info!("WebSocket closed by server");
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                break;
                            }
                            None => {
                                info!("WebSocket stream ended");
                                break;
                            }
                        }
                    }

                    _ = &mut shutdown_rx => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        Ok(Box::new(OpenAIRealtimeConnection {
            sender: Some(outgoing_tx),
            events: events_rx,
            shutdown: Some(shutdown_tx),
            task,
        }))
    }
}

// =============================================================================
// Connection
// =============================================================================

/// A live link to the OpenAI Realtime API.
pub struct OpenAIRealtimeConnection {
    sender: Option<mpsc::Sender<ClientEvent>>,
    events: mpsc::Receiver<ServerEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

#[async_trait]
impl UpstreamConnection for OpenAIRealtimeConnection {
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(RealtimeError::NotConnected);
        };
        debug!(event = event.kind(), "Sending upstream event");
        sender
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        self.sender = None;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            warn!("Upstream socket did not close in time, aborting");
            self.task.abort();
        }
    }
}

impl Drop for OpenAIRealtimeConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
