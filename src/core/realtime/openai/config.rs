//! OpenAI Realtime API configuration types.
//!
//! This module contains the endpoint constants, voice and audio format
//! enumerations, and the default session configuration used by tutoring
//! sessions.

use serde::{Deserialize, Serialize};

use super::messages::{InputAudioTranscription, SessionConfig, TurnDetection};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Default input transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    /// Ash voice
    Ash,
    /// Ballad voice
    Ballad,
    /// Coral voice
    Coral,
    /// Echo voice
    Echo,
    /// Sage voice
    Sage,
    /// Shimmer voice
    Shimmer,
    /// Verse voice
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name. Returns `None` for voices the API does not offer.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "ash" => Some(Self::Ash),
            "ballad" => Some(Self::Ballad),
            "coral" => Some(Self::Coral),
            "echo" => Some(Self::Echo),
            "sage" => Some(Self::Sage),
            "shimmer" => Some(Self::Shimmer),
            "verse" => Some(Self::Verse),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Supported audio formats for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeAudioFormat {
    /// PCM 16-bit signed little-endian (default)
    #[default]
    Pcm16,
    /// G.711 u-law (8-bit)
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law (8-bit)
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl OpenAIRealtimeAudioFormat {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    /// Bytes of encoded audio per second of playback.
    #[inline]
    pub fn bytes_per_second(&self) -> u32 {
        match self {
            Self::Pcm16 => 24000 * 2,
            Self::G711Ulaw | Self::G711Alaw => 8000,
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pcm16" | "pcm" | "linear16" => Self::Pcm16,
            "g711_ulaw" | "ulaw" | "mulaw" => Self::G711Ulaw,
            "g711_alaw" | "alaw" => Self::G711Alaw,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeAudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full session configuration a tutoring session starts from.
///
/// Audio in both directions, server VAD turn detection and whisper
/// transcription of the learner's speech. `instructions` is left unset; it is
/// always filled from the prompt layers.
pub fn default_session_config(voice: OpenAIRealtimeVoice) -> SessionConfig {
    SessionConfig {
        modalities: Some(vec!["audio".to_string(), "text".to_string()]),
        instructions: None,
        voice: Some(voice.as_str().to_string()),
        input_audio_format: Some(OpenAIRealtimeAudioFormat::Pcm16.as_str().to_string()),
        output_audio_format: Some(OpenAIRealtimeAudioFormat::Pcm16.as_str().to_string()),
        input_audio_transcription: Some(InputAudioTranscription {
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }),
        turn_detection: Some(TurnDetection::default()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parse() {
        assert_eq!(
            OpenAIRealtimeVoice::parse("SHIMMER"),
            Some(OpenAIRealtimeVoice::Shimmer)
        );
        assert_eq!(OpenAIRealtimeVoice::parse("robot"), None);
    }

    #[test]
    fn test_audio_format_bytes_per_second() {
        assert_eq!(OpenAIRealtimeAudioFormat::Pcm16.bytes_per_second(), 48000);
        assert_eq!(OpenAIRealtimeAudioFormat::G711Ulaw.bytes_per_second(), 8000);
    }

    #[test]
    fn test_audio_format_from_str() {
        assert_eq!(
            OpenAIRealtimeAudioFormat::from_str_or_default("g711_alaw"),
            OpenAIRealtimeAudioFormat::G711Alaw
        );
        assert_eq!(
            OpenAIRealtimeAudioFormat::from_str_or_default("opus"),
            OpenAIRealtimeAudioFormat::Pcm16
        );
    }

    #[test]
    fn test_default_session_config() {
        let config = default_session_config(OpenAIRealtimeVoice::Coral);
        assert_eq!(config.voice.as_deref(), Some("coral"));
        assert_eq!(config.input_audio_format.as_deref(), Some("pcm16"));
        assert_eq!(
            config.input_audio_transcription.map(|t| t.model),
            Some("whisper-1".to_string())
        );
        assert!(config.instructions.is_none());
    }
}
