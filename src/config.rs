//! Tunable timing constants shared by every part of the engine.
//!
//! The advance step ([`crate::entity`]) and the liveness predicates
//! ([`crate::liveness`]) both read their thresholds from one [`SyncConfig`]
//! so they can never disagree about when an entity is idle.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Length of one interpolation segment.  Should match the broadcast cadence.
pub const INTERPOLATION_DURATION_MS: f64 = 100.0;
/// Silence after which a remote entity snaps to its target and stops.
pub const IDLE_TIMEOUT_MS: f64 = 500.0;
/// Silence after which a remote entity is shown as disconnected.
pub const DISCONNECT_TIMEOUT_MS: f64 = 10_000.0;
/// Total lifetime of a speech bubble.
pub const BUBBLE_DURATION_MS: f64 = 5_000.0;
/// Fade-out window at the end of a bubble's life.
pub const FADE_DURATION_MS: f64 = 500.0;
/// Pop-in window at the start of a bubble's life.
pub const POP_DURATION_MS: f64 = 200.0;
/// Longest phrase a bubble will carry, in characters.
pub const MAX_PHRASE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Duration of one interpolation segment (ms).
    pub interpolation_duration_ms: f64,
    /// Idle threshold (ms since last waypoint).
    pub idle_timeout_ms: f64,
    /// Disconnect threshold (ms since last waypoint).
    pub disconnect_timeout_ms: f64,
    /// Default bubble lifetime (ms).
    pub bubble_duration_ms: f64,
    /// Bubble fade-out window (ms).
    pub bubble_fade_ms: f64,
    /// Bubble pop-in window (ms).
    pub bubble_pop_ms: f64,
    /// Phrases longer than this are truncated.
    pub max_phrase_chars: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interpolation_duration_ms: INTERPOLATION_DURATION_MS,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
            disconnect_timeout_ms: DISCONNECT_TIMEOUT_MS,
            bubble_duration_ms: BUBBLE_DURATION_MS,
            bubble_fade_ms: FADE_DURATION_MS,
            bubble_pop_ms: POP_DURATION_MS,
            max_phrase_chars: MAX_PHRASE_CHARS,
        }
    }
}

impl SyncConfig {
    /// Check that the thresholds describe a usable timeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("interpolation_duration_ms", self.interpolation_duration_ms),
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("disconnect_timeout_ms", self.disconnect_timeout_ms),
            ("bubble_duration_ms", self.bubble_duration_ms),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidDuration { field });
            }
        }
        for (field, value) in [
            ("bubble_fade_ms", self.bubble_fade_ms),
            ("bubble_pop_ms", self.bubble_pop_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDuration { field });
            }
        }

        if self.idle_timeout_ms >= self.disconnect_timeout_ms {
            return Err(ConfigError::ThresholdOrder {
                idle_ms: self.idle_timeout_ms,
                disconnect_ms: self.disconnect_timeout_ms,
            });
        }
        if self.bubble_pop_ms + self.bubble_fade_ms > self.bubble_duration_ms {
            return Err(ConfigError::BubbleTooShort {
                duration_ms: self.bubble_duration_ms,
            });
        }
        if self.max_phrase_chars == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "max_phrase_chars",
            });
        }
        Ok(())
    }
}
