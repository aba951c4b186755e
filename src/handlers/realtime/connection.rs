//! Per-connection tutoring session.
//!
//! A [`ConnectionHandler`] bridges one learner client and one upstream link
//! through `CONNECTING -> ACTIVE -> CLOSING -> CLOSED`. It is the single
//! writer for everything the session owns: the transcript, the instruction
//! layers and the upstream configuration. Client frames, upstream events and
//! speaking-rate samples are multiplexed in one `select!` loop, so control
//! messages never interleave.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::messages::{ClientChannel, ClientFrame, ClientMessage, ServerMessage};
use crate::core::realtime::openai::{
    ClientEvent, ConversationItem, OpenAIRealtimeVoice, ServerEvent,
};
use crate::core::realtime::{RealtimeResult, UpstreamConnection, UpstreamConnector};
use crate::core::session::{
    HistoryEntry, LiveSession, PromptAssembler, Role, ScenarioContext, SessionRegistry,
    SessionReport, TranscriptEntry, UpstreamSessionConfigurator, WpmMonitor, WpmSettings,
    inject_history,
};
use crate::errors::SessionSetupError;

/// Normal closure code sent after the final report.
const CLOSE_NORMAL: u16 = 1000;

/// Lifecycle of one handler. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandlerState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientDisconnected,
    UpstreamClosed,
    TransportError,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::UpstreamClosed => "upstream_closed",
            Self::TransportError => "transport_error",
        }
    }
}

/// Everything a handler needs to know about the session it serves.
#[derive(Clone)]
pub struct HandlerSettings {
    pub api_key: Option<Zeroizing<String>>,
    /// `None` for anonymous demo sessions
    pub session_id: Option<String>,
    pub title: Option<String>,
    pub context: Option<ScenarioContext>,
    pub voice: OpenAIRealtimeVoice,
    pub show_text: Option<bool>,
    /// Prior turns replayed into every fresh upstream link
    pub history: Vec<HistoryEntry>,
    pub base_prompt: String,
    pub wpm: WpmSettings,
}

/// Upstream speech timing, keyed by upstream item id.
#[derive(Debug, Default)]
struct SpeechTimer {
    started_ms: HashMap<String, u64>,
    durations: HashMap<String, f64>,
}

impl SpeechTimer {
    fn start(&mut self, item_id: String, audio_start_ms: u64) {
        self.started_ms.insert(item_id, audio_start_ms);
    }

    fn stop(&mut self, item_id: &str, audio_end_ms: u64) {
        if let Some(start) = self.started_ms.remove(item_id) {
            let seconds = audio_end_ms.saturating_sub(start) as f64 / 1000.0;
            self.durations.insert(item_id.to_string(), seconds);
        }
    }

    fn take(&mut self, item_id: &str) -> f64 {
        self.durations.remove(item_id).unwrap_or(0.0)
    }
}

/// Tutor turn being streamed.
#[derive(Debug, Default)]
struct PendingReply {
    transcript: String,
    audio_bytes: usize,
}

pub struct ConnectionHandler {
    state: HandlerState,
    settings: HandlerSettings,
    connector: Arc<dyn UpstreamConnector>,
    registry: Arc<SessionRegistry>,
    live: Arc<LiveSession>,
    configurator: UpstreamSessionConfigurator,
    upstream: Option<Box<dyn UpstreamConnection>>,
    client: ClientChannel,
    state_listener: Option<mpsc::UnboundedSender<HandlerState>>,
    wpm: WpmMonitor,
    timer: SpeechTimer,
    reply: PendingReply,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl ConnectionHandler {
    pub fn new(
        settings: HandlerSettings,
        connector: Arc<dyn UpstreamConnector>,
        registry: Arc<SessionRegistry>,
        client: ClientChannel,
    ) -> Self {
        let live = Arc::new(LiveSession::new(settings.context.clone()));
        let configurator = UpstreamSessionConfigurator::new(
            PromptAssembler::new(settings.base_prompt.clone()),
            settings.voice,
        );
        let wpm = WpmMonitor::new(settings.wpm);
        Self {
            state: HandlerState::Connecting,
            settings,
            connector,
            registry,
            live,
            configurator,
            upstream: None,
            client,
            state_listener: None,
            wpm,
            timer: SpeechTimer::default(),
            reply: PendingReply::default(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Report every state the handler enters, starting with `Connecting`.
    pub fn with_state_listener(mut self, listener: mpsc::UnboundedSender<HandlerState>) -> Self {
        self.state_listener = Some(listener);
        self
    }

    fn transition(&mut self, next: HandlerState) {
        if next <= self.state {
            warn!(from = ?self.state, to = ?next, "Ignoring backward state transition");
            return;
        }
        debug!(session_id = ?self.settings.session_id, from = ?self.state, to = ?next, "Handler state change");
        self.state = next;
        self.publish_state();
    }

    fn publish_state(&self) {
        if let Some(listener) = &self.state_listener {
            let _ = listener.send(self.state);
        }
    }

    /// Drive the session to completion.
    ///
    /// Setup failures close the client with their status code and return
    /// `Err`. Otherwise the session runs until either side goes away and
    /// yields the report, or `None` when nothing was said.
    pub async fn run(mut self) -> Result<Option<SessionReport>, SessionSetupError> {
        let session_id = self.settings.session_id.clone();
        info!(session_id = ?session_id, voice = %self.settings.voice, "Starting tutoring session");
        self.publish_state();

        if let Err(e) = self.connect().await {
            warn!(session_id = ?session_id, "Session setup failed: {}", e);
            self.transition(HandlerState::Closed);
            self.client.close(e.close_code(), e.close_reason()).await;
            return Err(e);
        }

        // Unregisters on every exit path, including panics.
        let _registration = session_id
            .as_ref()
            .map(|id| self.registry.register(id.clone(), self.live.clone()));

        self.transition(HandlerState::Active);
        self.started_at = Some(Utc::now());
        self.client
            .send(ServerMessage::Ready {
                session_id: session_id.clone(),
            })
            .await;

        let reason = self.relay().await;
        info!(session_id = ?session_id, reason = reason.as_str(), "Session closing");

        self.transition(HandlerState::Closing);
        self.flush_reply();
        self.ended_at = Some(Utc::now());
        if let Some(mut upstream) = self.upstream.take() {
            upstream.close().await;
        }

        let report = self.build_report();
        self.transition(HandlerState::Closed);

        self.client
            .send(ServerMessage::Disconnected {
                reason: reason.as_str().to_string(),
                report: report.clone(),
            })
            .await;
        self.client.close(CLOSE_NORMAL, "Session ended").await;

        info!(
            session_id = ?session_id,
            messages = report.as_ref().map_or(0, |r| r.messages.len()),
            "Session closed"
        );
        Ok(report)
    }

    // =========================================================================
    // CONNECTING
    // =========================================================================

    async fn connect(&mut self) -> Result<(), SessionSetupError> {
        let upstream = self.open_upstream(&self.settings.history).await?;
        self.upstream = Some(upstream);
        Ok(())
    }

    /// Open, configure and seed a fresh upstream link.
    async fn open_upstream(
        &self,
        history: &[HistoryEntry],
    ) -> Result<Box<dyn UpstreamConnection>, SessionSetupError> {
        let api_key = self
            .settings
            .api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or(SessionSetupError::MissingCredential)?;

        let mut upstream = self.connector.connect(api_key).await?;
        let seeded = self.seed_upstream(upstream.as_ref(), history).await;
        if let Err(e) = seeded {
            upstream.close().await;
            return Err(e.into());
        }
        Ok(upstream)
    }

    async fn seed_upstream(
        &self,
        upstream: &dyn UpstreamConnection,
        history: &[HistoryEntry],
    ) -> RealtimeResult<()> {
        self.configurator.initialize(upstream).await?;
        inject_history(Some(upstream), history).await?;
        Ok(())
    }

    /// Replace the upstream link after a reconnect-required change.
    ///
    /// Client frames arriving meanwhile wait in the inbound channel.
    async fn reconnect(&mut self) -> Result<(), SessionSetupError> {
        info!(
            session_id = ?self.settings.session_id,
            voice = self.configurator.voice(),
            "Reconnecting upstream"
        );
        if let Some(mut old) = self.upstream.take() {
            old.close().await;
        }
        // Item ids are scoped to the old link
        self.reply = PendingReply::default();
        self.timer = SpeechTimer::default();

        let history: Vec<HistoryEntry> = self
            .settings
            .history
            .iter()
            .cloned()
            .chain(self.live.transcript().iter().map(HistoryEntry::from))
            .collect();
        let upstream = self.open_upstream(&history).await?;
        self.upstream = Some(upstream);
        Ok(())
    }

    // =========================================================================
    // ACTIVE
    // =========================================================================

    async fn relay(&mut self) -> CloseReason {
        let mut sampler = tokio::time::interval(self.settings.wpm.sample_interval);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sampler.tick().await;

        loop {
            let Some(upstream) = self.upstream.as_mut() else {
                return CloseReason::UpstreamClosed;
            };

            tokio::select! {
                frame = self.client.inbound.recv() => {
                    let frame = match frame {
                        Some(ClientFrame::Close) | None => return CloseReason::ClientDisconnected,
                        Some(frame) => frame,
                    };
                    if let ControlFlow::Break(reason) = self.handle_client_frame(frame).await {
                        return reason;
                    }
                }
                event = upstream.next_event() => {
                    let Some(event) = event else {
                        info!(session_id = ?self.settings.session_id, "Upstream closed the link");
                        return CloseReason::UpstreamClosed;
                    };
                    self.handle_upstream_event(event).await;
                }
                _ = sampler.tick() => {
                    self.sample_wpm().await;
                }
            }
        }
    }

    async fn forward(&self, event: ClientEvent) -> ControlFlow<CloseReason> {
        let Some(upstream) = self.upstream.as_deref() else {
            return ControlFlow::Break(CloseReason::UpstreamClosed);
        };
        let kind = event.kind();
        match upstream.send(event).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                error!(session_id = ?self.settings.session_id, event = kind, "Upstream send failed: {}", e);
                ControlFlow::Break(CloseReason::TransportError)
            }
        }
    }

    async fn handle_client_frame(&mut self, frame: ClientFrame) -> ControlFlow<CloseReason> {
        let text = match frame {
            ClientFrame::Binary(audio) => {
                return self.forward(ClientEvent::audio_append(&audio)).await;
            }
            ClientFrame::Close => return ControlFlow::Break(CloseReason::ClientDisconnected),
            ClientFrame::Text(text) => text,
        };

        let message: ClientMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!(session_id = ?self.settings.session_id, "Dropping malformed client message: {}", e);
                self.client
                    .send(ServerMessage::error("invalid_message", format!("Invalid message: {e}")))
                    .await;
                return ControlFlow::Continue(());
            }
        };
        if let Err(e) = message.validate_size() {
            warn!(session_id = ?self.settings.session_id, "Dropping oversized client message: {}", e);
            self.client
                .send(ServerMessage::error("message_too_large", e.to_string()))
                .await;
            return ControlFlow::Continue(());
        }

        match message {
            ClientMessage::AudioAppend { audio } => {
                self.forward(ClientEvent::InputAudioBufferAppend { audio })
                    .await
            }
            ClientMessage::AudioCommit => self.forward(ClientEvent::InputAudioBufferCommit).await,
            ClientMessage::AudioClear => self.forward(ClientEvent::InputAudioBufferClear).await,
            ClientMessage::ResponseCreate => self.forward(ClientEvent::ResponseCreate).await,
            ClientMessage::Text { text } => {
                let item = ConversationItem::text_message(Role::User.as_str(), text.clone());
                self.forward(ClientEvent::ConversationItemCreate { item })
                    .await?;
                self.live
                    .record(TranscriptEntry::new(Role::User, text, 0.0));
                self.forward(ClientEvent::ResponseCreate).await
            }
            ClientMessage::SessionUpdate { config } => {
                if config.is_empty() {
                    warn!(session_id = ?self.settings.session_id, "Dropping session.update without settings");
                    self.client
                        .send(ServerMessage::error(
                            "invalid_message",
                            "session.update carries no settings",
                        ))
                        .await;
                    return ControlFlow::Continue(());
                }
                let outcome = self
                    .configurator
                    .apply_update(config, self.upstream.as_deref())
                    .await;
                if outcome.reconnect_required()
                    && let Err(e) = self.reconnect().await
                {
                    error!(session_id = ?self.settings.session_id, "Upstream reconnect failed: {}", e);
                    self.client
                        .send(ServerMessage::error("reconnect_failed", e.to_string()))
                        .await;
                    return ControlFlow::Break(CloseReason::TransportError);
                }
                ControlFlow::Continue(())
            }
            ClientMessage::Disconnect => ControlFlow::Break(CloseReason::ClientDisconnected),
        }
    }

    async fn handle_upstream_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Error { error } => {
                warn!(
                    session_id = ?self.settings.session_id,
                    error_type = %error.error_type,
                    "Upstream error: {}",
                    error.message
                );
                self.client
                    .send(ServerMessage::Error {
                        code: error.code.or(Some(error.error_type)),
                        message: error.message,
                    })
                    .await;
            }
            ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
                debug!(upstream_session = %session.id, "Upstream session acknowledged");
            }
            ServerEvent::SpeechStarted {
                audio_start_ms,
                item_id,
            } => {
                self.timer.start(item_id, audio_start_ms);
                self.client.send(ServerMessage::SpeechStarted).await;
            }
            ServerEvent::SpeechStopped {
                audio_end_ms,
                item_id,
            } => {
                self.timer.stop(&item_id, audio_end_ms);
                self.client.send(ServerMessage::SpeechStopped).await;
            }
            ServerEvent::TranscriptionCompleted {
                item_id,
                transcript,
            } => {
                let duration = self.timer.take(&item_id);
                let transcript = transcript.trim().to_string();
                if transcript.is_empty() {
                    return;
                }
                self.wpm.record(Instant::now(), &transcript, duration);
                self.live.record(TranscriptEntry::new(
                    Role::User,
                    transcript.clone(),
                    duration,
                ));
                self.client
                    .send(ServerMessage::UserTranscript { transcript })
                    .await;
            }
            ServerEvent::AudioDelta { delta, .. } => {
                self.reply.audio_bytes += ServerEvent::decoded_audio_len(&delta);
                self.client.send(ServerMessage::AudioDelta { delta }).await;
            }
            ServerEvent::AudioDone { .. } => {
                self.client.send(ServerMessage::AudioDone).await;
            }
            ServerEvent::AudioTranscriptDelta { delta, .. } => {
                self.reply.transcript.push_str(&delta);
            }
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                if !transcript.is_empty() {
                    self.reply.transcript = transcript;
                }
                if let Some(transcript) = self.flush_reply() {
                    self.client
                        .send(ServerMessage::TranscriptDone { transcript })
                        .await;
                }
            }
            ServerEvent::TextDone { text, .. } => {
                self.reply.transcript = text;
                if let Some(transcript) = self.flush_reply() {
                    self.client
                        .send(ServerMessage::TranscriptDone { transcript })
                        .await;
                }
            }
            ServerEvent::ResponseDone {} => {
                debug!(session_id = ?self.settings.session_id, "Response done");
            }
            ServerEvent::Unknown => {}
        }
    }

    /// Record the pending tutor turn, if any. Returns its text.
    fn flush_reply(&mut self) -> Option<String> {
        let reply = std::mem::take(&mut self.reply);
        let transcript = reply.transcript.trim().to_string();
        if transcript.is_empty() {
            return None;
        }
        let bytes_per_second = self.configurator.output_format().bytes_per_second() as f64;
        let duration = reply.audio_bytes as f64 / bytes_per_second;
        self.live.record(TranscriptEntry::new(
            Role::Assistant,
            transcript.clone(),
            duration,
        ));
        Some(transcript)
    }

    async fn sample_wpm(&mut self) {
        let Some(status) = self.wpm.sample(Instant::now()) else {
            return;
        };
        info!(session_id = ?self.settings.session_id, status = %status, "Speaking rate changed");
        self.live.set_wpm_status(status);
        self.configurator
            .apply_dynamic_adjustment(status, self.upstream.as_deref())
            .await;
        self.client
            .send(ServerMessage::DebugState {
                wpm_status: status,
                dynamic_instruction: self.configurator.assembler().dynamic().to_string(),
            })
            .await;
    }

    // =========================================================================
    // CLOSING
    // =========================================================================

    fn build_report(&self) -> Option<SessionReport> {
        let started_at = self.started_at?;
        let ended_at = self.ended_at.unwrap_or_else(Utc::now);
        let messages = self.live.transcript();
        if messages.is_empty() {
            debug!(session_id = ?self.settings.session_id, "Empty transcript, no report");
            return None;
        }

        let context = self.settings.context.clone().unwrap_or_default();
        Some(SessionReport {
            session_id: self.settings.session_id.clone(),
            title: self.settings.title.clone(),
            started_at,
            ended_at,
            total_duration_sec: (ended_at - started_at).num_milliseconds() as f64 / 1000.0,
            user_speech_duration_sec: SessionReport::user_speech_seconds(&messages),
            messages,
            scenario_place: context.place,
            scenario_partner: context.partner,
            scenario_goal: context.goal,
            voice: Some(self.configurator.voice().to_string()),
            show_text: self.settings.show_text,
        })
    }
}
