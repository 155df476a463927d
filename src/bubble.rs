//! Speech bubbles.
//!
//! A bubble stores only its start time; phase, scale and opacity are derived
//! from `now - started_at_ms` on every read, so there are no timers to cancel
//! when a bubble is replaced or its owner leaves.
//!
//! ```text
//!  0 ── pop ───────────────── duration - fade ──── duration
//!  │ PopIn │      Visible      │      Fading        │ Expired
//!  scale 0.5→1                   opacity 1→0
//! ```

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::interp::{clamp, lerp, smoothstep};

const POP_START_SCALE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BubblePhase {
    PopIn,
    Visible,
    Fading,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub owner_id: String,
    pub phrase: String,
    pub started_at_ms: f64,
    pub duration_ms: f64,
}

/// Everything the overlay renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleView {
    pub text: String,
    pub phase: BubblePhase,
    pub opacity: f32,
    pub scale: f32,
}

impl Bubble {
    pub fn new(
        owner_id: impl Into<String>,
        phrase: impl Into<String>,
        started_at_ms: f64,
        cfg: &SyncConfig,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            phrase: phrase.into(),
            started_at_ms,
            duration_ms: cfg.bubble_duration_ms,
        }
    }

    fn elapsed(&self, now_ms: f64) -> f64 {
        (now_ms - self.started_at_ms).max(0.0)
    }

    fn fade_start(&self, cfg: &SyncConfig) -> f64 {
        (self.duration_ms - cfg.bubble_fade_ms).max(0.0)
    }

    pub fn phase(&self, now_ms: f64, cfg: &SyncConfig) -> BubblePhase {
        let elapsed = self.elapsed(now_ms);
        if elapsed >= self.duration_ms {
            BubblePhase::Expired
        } else if elapsed >= self.fade_start(cfg) {
            BubblePhase::Fading
        } else if elapsed < cfg.bubble_pop_ms {
            BubblePhase::PopIn
        } else {
            BubblePhase::Visible
        }
    }

    pub fn is_expired(&self, now_ms: f64, cfg: &SyncConfig) -> bool {
        self.phase(now_ms, cfg) == BubblePhase::Expired
    }

    pub fn scale(&self, now_ms: f64, cfg: &SyncConfig) -> f32 {
        match self.phase(now_ms, cfg) {
            BubblePhase::PopIn => {
                let t = (self.elapsed(now_ms) / cfg.bubble_pop_ms) as f32;
                lerp(POP_START_SCALE, 1.0, smoothstep(clamp(t, 0.0, 1.0)))
            }
            _ => 1.0,
        }
    }

    pub fn opacity(&self, now_ms: f64, cfg: &SyncConfig) -> f32 {
        match self.phase(now_ms, cfg) {
            BubblePhase::Expired => 0.0,
            BubblePhase::Fading if cfg.bubble_fade_ms > 0.0 => {
                let t = ((self.elapsed(now_ms) - self.fade_start(cfg)) / cfg.bubble_fade_ms) as f32;
                1.0 - smoothstep(clamp(t, 0.0, 1.0))
            }
            _ => 1.0,
        }
    }

    /// `None` once expired.
    pub fn view(&self, now_ms: f64, cfg: &SyncConfig) -> Option<BubbleView> {
        let phase = self.phase(now_ms, cfg);
        if phase == BubblePhase::Expired {
            return None;
        }
        Some(BubbleView {
            text: self.phrase.clone(),
            phase,
            opacity: self.opacity(now_ms, cfg),
            scale: self.scale(now_ms, cfg),
        })
    }
}

/// Trim and cap a chat phrase.  Returns `None` for blank input.
pub fn bound_phrase(raw: &str, max_chars: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}
