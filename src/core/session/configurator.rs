//! Upstream session configuration.
//!
//! [`UpstreamSessionConfigurator`] owns the settings of one tutoring session
//! (voice, audio formats, turn detection, transcription) together with the
//! [`PromptAssembler`], and turns setting changes into `session.update`
//! control messages. `instructions` is never stored on its own: it is always
//! the latest output of the assembler.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::prompt::PromptAssembler;
use super::wpm::WpmStatus;
use crate::core::realtime::openai::{
    ClientEvent, OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, SessionConfig,
    default_session_config,
};
use crate::core::realtime::{RealtimeResult, UpstreamConnection};

/// Keys whose change cannot be applied to a live upstream link.
pub const RECONNECT_KEYS: &[&str] = &["voice"];

/// What the caller has to do after [`UpstreamSessionConfigurator::apply_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Changes (if any) were forwarded on the current link
    AppliedLive,
    /// Tear down the link, open a new one and call `initialize` on it
    ReconnectRequired,
}

impl UpdateOutcome {
    #[inline]
    pub fn reconnect_required(&self) -> bool {
        matches!(self, Self::ReconnectRequired)
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamSessionConfigurator {
    assembler: PromptAssembler,
    config: SessionConfig,
}

impl UpstreamSessionConfigurator {
    pub fn new(assembler: PromptAssembler, voice: OpenAIRealtimeVoice) -> Self {
        Self {
            assembler,
            config: default_session_config(voice),
        }
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    pub fn voice(&self) -> &str {
        self.config
            .voice
            .as_deref()
            .unwrap_or(OpenAIRealtimeVoice::Alloy.as_str())
    }

    pub fn output_format(&self) -> OpenAIRealtimeAudioFormat {
        self.config
            .output_audio_format
            .as_deref()
            .map(OpenAIRealtimeAudioFormat::from_str_or_default)
            .unwrap_or_default()
    }

    /// The complete configuration with freshly assembled instructions.
    pub fn full_config(&self) -> SessionConfig {
        SessionConfig {
            instructions: Some(self.assembler.assemble()),
            ..self.config.clone()
        }
    }

    /// Send the complete configuration as one `session.update`.
    ///
    /// Called once per upstream link before any relay. Failures propagate:
    /// a link that never got its configuration is not usable.
    pub async fn initialize(&self, upstream: &dyn UpstreamConnection) -> RealtimeResult<()> {
        let session = self.full_config();
        debug!(voice = self.voice(), "Initializing upstream session");
        upstream.send(ClientEvent::SessionUpdate { session }).await
    }

    /// Apply a client settings delta.
    ///
    /// Unknown keys are ignored. Malformed values are logged and ignored.
    /// When a reconnect-required key changed nothing is forwarded; the new
    /// values are picked up by the next `initialize`.
    pub async fn apply_update(
        &mut self,
        delta: Map<String, Value>,
        upstream: Option<&dyn UpstreamConnection>,
    ) -> UpdateOutcome {
        let mut partial = SessionConfig::default();
        let mut reconnect = false;

        for (key, value) in delta {
            let changed = match key.as_str() {
                "instructions" => self.update_user_layer(value, &mut partial),
                "voice" => self.update_voice(value),
                "modalities" => {
                    replace(&key, value, &mut self.config.modalities, &mut partial.modalities)
                }
                "input_audio_format" => replace(
                    &key,
                    value,
                    &mut self.config.input_audio_format,
                    &mut partial.input_audio_format,
                ),
                "output_audio_format" => replace(
                    &key,
                    value,
                    &mut self.config.output_audio_format,
                    &mut partial.output_audio_format,
                ),
                "input_audio_transcription" => replace(
                    &key,
                    value,
                    &mut self.config.input_audio_transcription,
                    &mut partial.input_audio_transcription,
                ),
                "turn_detection" => replace(
                    &key,
                    value,
                    &mut self.config.turn_detection,
                    &mut partial.turn_detection,
                ),
                _ => {
                    debug!(key = %key, "Ignoring unknown session setting");
                    false
                }
            };
            if changed && RECONNECT_KEYS.contains(&key.as_str()) {
                reconnect = true;
            }
        }

        if reconnect {
            info!(voice = self.voice(), "Session update requires a new upstream link");
            return UpdateOutcome::ReconnectRequired;
        }

        if partial.is_empty() {
            return UpdateOutcome::AppliedLive;
        }
        match upstream {
            Some(upstream) => {
                if let Err(e) = upstream
                    .send(ClientEvent::SessionUpdate { session: partial })
                    .await
                {
                    warn!("Failed to forward session update: {}", e);
                }
            }
            None => debug!("No upstream link, session update stored only"),
        }
        UpdateOutcome::AppliedLive
    }

    /// Adapt tutor pacing to the learner's rate.
    ///
    /// Sends an instructions-only update when the dynamic layer changed.
    /// Returns whether it changed.
    pub async fn apply_dynamic_adjustment(
        &mut self,
        status: WpmStatus,
        upstream: Option<&dyn UpstreamConnection>,
    ) -> bool {
        let text = status.pacing_instruction();
        if text == self.assembler.dynamic() {
            return false;
        }
        self.assembler.set_dynamic(text);
        info!(status = %status, "Applying dynamic pacing adjustment");

        if let Some(upstream) = upstream {
            let session = SessionConfig {
                instructions: Some(self.assembler.assemble()),
                ..Default::default()
            };
            if let Err(e) = upstream.send(ClientEvent::SessionUpdate { session }).await {
                warn!("Failed to send pacing adjustment: {}", e);
            }
        }
        true
    }

    fn update_user_layer(&mut self, value: Value, partial: &mut SessionConfig) -> bool {
        let Value::String(text) = value else {
            warn!("Ignoring non-string instructions");
            return false;
        };
        if text == self.assembler.active_user() {
            return false;
        }
        self.assembler.set_active_user(text);
        partial.instructions = Some(self.assembler.assemble());
        true
    }

    fn update_voice(&mut self, value: Value) -> bool {
        let Some(voice) = value.as_str().and_then(OpenAIRealtimeVoice::parse) else {
            warn!(value = %value, "Ignoring unsupported voice");
            return false;
        };
        if self.config.voice.as_deref() == Some(voice.as_str()) {
            return false;
        }
        self.config.voice = Some(voice.as_str().to_string());
        true
    }
}

/// Store `value` into `current` when it parses and differs, mirroring it into
/// the outgoing partial update.
fn replace<T>(key: &str, value: Value, current: &mut Option<T>, partial: &mut Option<T>) -> bool
where
    T: DeserializeOwned + PartialEq + Clone,
{
    match serde_json::from_value::<T>(value) {
        Ok(parsed) if current.as_ref() == Some(&parsed) => false,
        Ok(parsed) => {
            *current = Some(parsed.clone());
            *partial = Some(parsed);
            true
        }
        Err(e) => {
            warn!(key = %key, "Ignoring malformed session setting: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::realtime::openai::TurnDetection;
    use crate::core::realtime::testing::RecordingUpstream;

    fn configurator() -> UpstreamSessionConfigurator {
        UpstreamSessionConfigurator::new(
            PromptAssembler::new("You are Malang."),
            OpenAIRealtimeVoice::Alloy,
        )
    }

    fn delta(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("delta must be an object"),
        }
    }

    fn session_of(event: &ClientEvent) -> &SessionConfig {
        match event {
            ClientEvent::SessionUpdate { session } => session,
            other => panic!("expected session.update, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_initialize_sends_full_config() {
        let upstream = RecordingUpstream::default();
        let configurator = configurator();
        configurator.initialize(&upstream).await.unwrap();

        let sent = upstream.sent();
        assert_eq!(sent.len(), 1);
        let session = session_of(&sent[0]);
        assert_eq!(session.instructions.as_deref(), Some("You are Malang."));
        assert_eq!(session.voice.as_deref(), Some("alloy"));
        assert_eq!(session.turn_detection, Some(TurnDetection::default()));
    }

    #[tokio::test]
    async fn test_voice_change_requires_reconnect() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        let outcome = configurator
            .apply_update(delta(json!({"voice": "shimmer"})), Some(&upstream))
            .await;
        assert_eq!(outcome, UpdateOutcome::ReconnectRequired);
        assert!(upstream.sent().is_empty());
        assert_eq!(configurator.voice(), "shimmer");
    }

    #[tokio::test]
    async fn test_same_voice_is_noop() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        let outcome = configurator
            .apply_update(delta(json!({"voice": "alloy"})), Some(&upstream))
            .await;
        assert_eq!(outcome, UpdateOutcome::AppliedLive);
        assert!(upstream.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_voice_is_ignored() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        let outcome = configurator
            .apply_update(delta(json!({"voice": "robot"})), Some(&upstream))
            .await;
        assert!(!outcome.reconnect_required());
        assert_eq!(configurator.voice(), "alloy");
    }

    #[tokio::test]
    async fn test_instructions_forward_assembled_text() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        configurator
            .apply_update(
                delta(json!({"instructions": "Please use formal tone"})),
                Some(&upstream),
            )
            .await;

        let sent = upstream.sent();
        assert_eq!(sent.len(), 1);
        let session = session_of(&sent[0]);
        assert_eq!(
            session.instructions.as_deref(),
            Some(configurator.assembler().assemble().as_str())
        );
        assert_ne!(session.instructions.as_deref(), Some("Please use formal tone"));
        assert!(session.voice.is_none());
    }

    #[tokio::test]
    async fn test_unknown_keys_are_ignored() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();
        let before = configurator.full_config();

        let outcome = configurator
            .apply_update(delta(json!({"temperature_boost": 3})), Some(&upstream))
            .await;
        assert_eq!(outcome, UpdateOutcome::AppliedLive);
        assert!(upstream.sent().is_empty());
        assert_eq!(configurator.full_config(), before);
    }

    #[tokio::test]
    async fn test_live_update_forwards_only_changed_keys() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        configurator
            .apply_update(
                delta(json!({
                    "modalities": ["audio", "text"],
                    "turn_detection": {"type": "server_vad", "silence_duration_ms": 800}
                })),
                Some(&upstream),
            )
            .await;

        let sent = upstream.sent();
        assert_eq!(sent.len(), 1);
        let session = session_of(&sent[0]);
        assert!(session.modalities.is_none());
        assert_eq!(
            session.turn_detection,
            Some(TurnDetection::ServerVad {
                threshold: None,
                prefix_padding_ms: None,
                silence_duration_ms: Some(800),
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_value_is_ignored() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        configurator
            .apply_update(delta(json!({"modalities": "audio"})), Some(&upstream))
            .await;
        assert!(upstream.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_adjustment_is_idempotent() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();

        assert!(
            configurator
                .apply_dynamic_adjustment(WpmStatus::Slow, Some(&upstream))
                .await
        );
        assert!(
            !configurator
                .apply_dynamic_adjustment(WpmStatus::Slow, Some(&upstream))
                .await
        );
        assert_eq!(upstream.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_adjustment_sends_instructions_only() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();
        configurator
            .apply_update(delta(json!({"instructions": "Be brief"})), None)
            .await;

        configurator
            .apply_dynamic_adjustment(WpmStatus::Fast, Some(&upstream))
            .await;

        let sent = upstream.sent();
        let session = session_of(&sent[0]);
        assert_eq!(
            session,
            &SessionConfig {
                instructions: Some(
                    "You are Malang.\n\n[User Requirement]\nBe brief\n\n[Dynamic Adjustment]\n\
                     The user is fluent. You should speak at a natural, faster pace like a native speaker."
                        .to_string()
                ),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_normal_status_clears_dynamic_layer() {
        let upstream = RecordingUpstream::default();
        let mut configurator = configurator();
        configurator
            .apply_dynamic_adjustment(WpmStatus::Slow, Some(&upstream))
            .await;
        assert!(
            configurator
                .apply_dynamic_adjustment(WpmStatus::Normal, Some(&upstream))
                .await
        );
        assert!(
            !configurator
                .apply_dynamic_adjustment(WpmStatus::Normal, Some(&upstream))
                .await
        );
        assert_eq!(configurator.assembler().assemble(), "You are Malang.");

        // One message for Slow, exactly one for the return to Normal
        let sent = upstream.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            ClientEvent::SessionUpdate {
                session: SessionConfig {
                    instructions: Some("You are Malang.".to_string()),
                    ..Default::default()
                }
            }
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let upstream = RecordingUpstream::failing();
        let mut configurator = configurator();

        let outcome = configurator
            .apply_update(delta(json!({"instructions": "Be kind"})), Some(&upstream))
            .await;
        assert_eq!(outcome, UpdateOutcome::AppliedLive);
        assert!(
            configurator
                .apply_dynamic_adjustment(WpmStatus::Slow, Some(&upstream))
                .await
        );
    }

    #[tokio::test]
    async fn test_instructions_survive_reconnect() {
        let mut configurator = configurator();
        let outcome = configurator
            .apply_update(
                delta(json!({"voice": "coral", "instructions": "Use formal tone"})),
                None,
            )
            .await;
        assert!(outcome.reconnect_required());

        let fresh = RecordingUpstream::default();
        configurator.initialize(&fresh).await.unwrap();
        let sent = fresh.sent();
        let session = session_of(&sent[0]);
        assert_eq!(session.voice.as_deref(), Some("coral"));
        assert!(
            session
                .instructions
                .as_deref()
                .unwrap()
                .ends_with("[User Requirement]\nUse formal tone")
        );
    }
}
