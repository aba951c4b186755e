//! Speaking-rate monitoring.
//!
//! The learner's words-per-minute is measured over a sliding window of
//! completed utterances and reduced to a coarse [`WpmStatus`]. Only changes
//! of status are reported, so the caller sends at most one upstream update
//! per transition.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Coarse classification of the learner's speaking rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WpmStatus {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl WpmStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }

    /// Pacing instruction for the tutor. Empty for `Normal`.
    pub fn pacing_instruction(&self) -> &'static str {
        match self {
            Self::Slow => {
                "The user speaks slowly. Please speak slowly and clearly, articulating every word."
            }
            Self::Fast => {
                "The user is fluent. You should speak at a natural, faster pace like a native speaker."
            }
            Self::Normal => "",
        }
    }
}

impl std::fmt::Display for WpmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for the monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WpmSettings {
    /// Below this rate the learner counts as slow
    pub slow_threshold: f64,
    /// Above this rate the learner counts as fast
    pub fast_threshold: f64,
    /// How far back utterances are considered
    pub window: Duration,
    /// How often the handler samples the monitor
    pub sample_interval: Duration,
}

impl Default for WpmSettings {
    fn default() -> Self {
        Self {
            slow_threshold: 90.0,
            fast_threshold: 150.0,
            window: Duration::from_secs(60),
            sample_interval: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Utterance {
    at: Instant,
    words: usize,
    seconds: f64,
}

/// Sliding-window words-per-minute monitor.
#[derive(Debug)]
pub struct WpmMonitor {
    settings: WpmSettings,
    utterances: VecDeque<Utterance>,
    status: WpmStatus,
}

impl WpmMonitor {
    pub fn new(settings: WpmSettings) -> Self {
        Self {
            settings,
            utterances: VecDeque::new(),
            status: WpmStatus::Normal,
        }
    }

    pub fn status(&self) -> WpmStatus {
        self.status
    }

    /// Record a completed learner utterance. Utterances without a measured
    /// duration carry no rate information and are skipped.
    pub fn record(&mut self, at: Instant, text: &str, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        let words = text.split_whitespace().count();
        if words == 0 {
            return;
        }
        self.utterances.push_back(Utterance { at, words, seconds });
    }

    /// Words per minute over the window ending at `now`.
    pub fn current_wpm(&mut self, now: Instant) -> Option<f64> {
        self.evict(now);
        let (words, seconds) = self
            .utterances
            .iter()
            .fold((0usize, 0.0f64), |(w, s), u| (w + u.words, s + u.seconds));
        (seconds > 0.0).then(|| words as f64 * 60.0 / seconds)
    }

    /// Re-classify the window. Returns the new status only when it changed.
    pub fn sample(&mut self, now: Instant) -> Option<WpmStatus> {
        let next = match self.current_wpm(now) {
            Some(wpm) if wpm < self.settings.slow_threshold => WpmStatus::Slow,
            Some(wpm) if wpm > self.settings.fast_threshold => WpmStatus::Fast,
            _ => WpmStatus::Normal,
        };
        if next == self.status {
            return None;
        }
        self.status = next;
        Some(next)
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.utterances.front() {
            if now.saturating_duration_since(front.at) > self.settings.window {
                self.utterances.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> WpmMonitor {
        WpmMonitor::new(WpmSettings::default())
    }

    #[test]
    fn test_empty_window_is_normal() {
        let mut m = monitor();
        assert_eq!(m.current_wpm(Instant::now()), None);
        assert_eq!(m.sample(Instant::now()), None);
        assert_eq!(m.status(), WpmStatus::Normal);
    }

    #[test]
    fn test_fast_speaker() {
        let mut m = monitor();
        let now = Instant::now();
        // 20 words in 4 seconds = 300 wpm
        m.record(now, &"word ".repeat(20), 4.0);
        assert_eq!(m.current_wpm(now), Some(300.0));
        assert_eq!(m.sample(now), Some(WpmStatus::Fast));
        assert_eq!(m.sample(now), None);
    }

    #[test]
    fn test_slow_speaker() {
        let mut m = monitor();
        let now = Instant::now();
        // 5 words in 6 seconds = 50 wpm
        m.record(now, "I go to the park", 6.0);
        assert_eq!(m.sample(now), Some(WpmStatus::Slow));
    }

    #[test]
    fn test_window_eviction_returns_to_normal() {
        let mut m = WpmMonitor::new(WpmSettings {
            window: Duration::from_secs(10),
            ..Default::default()
        });
        let start = Instant::now();
        m.record(start, "I go to the park", 6.0);
        assert_eq!(m.sample(start), Some(WpmStatus::Slow));

        let later = start + Duration::from_secs(11);
        assert_eq!(m.sample(later), Some(WpmStatus::Normal));
    }

    #[test]
    fn test_zero_duration_is_ignored() {
        let mut m = monitor();
        let now = Instant::now();
        m.record(now, "typed text without audio", 0.0);
        assert_eq!(m.current_wpm(now), None);
    }

    #[test]
    fn test_pacing_instructions() {
        assert!(WpmStatus::Slow.pacing_instruction().contains("slowly"));
        assert!(WpmStatus::Fast.pacing_instruction().contains("native"));
        assert_eq!(WpmStatus::Normal.pacing_instruction(), "");
    }
}
