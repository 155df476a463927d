//! `RemoteEntity`: one avatar owned by another client.
//!
//! A record holds the current interpolation segment (`prev` → `target`) and
//! the visual position derived from it.  Both entry points return a *new*
//! record instead of mutating in place, so a reader between a broadcast and a
//! render tick never sees a half-applied update.
//!
//! ```text
//!   waypoint ──► with_update()   prev = visual, target = waypoint, progress = 0
//!   frame    ──► advanced()      progress += dt / window, visual = lerp(ease)
//! ```

use crate::config::SyncConfig;
use crate::interp::{clamp, lerp, smoothstep};
use crate::liveness::{classify, Liveness};
use crate::types::{AvatarAppearance, Facing, Vec2};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A validated position sample for one remote entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub x: f32,
    pub y: f32,
    /// `None` keeps the current facing.
    pub facing: Option<Facing>,
    /// Sender-side timestamp, used only to order samples from the same sender.
    pub sent_at: Option<f64>,
    pub name: Option<String>,
    pub avatar: Option<AvatarAppearance>,
}

impl Waypoint {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            facing: None,
            sent_at: None,
            name: None,
            avatar: None,
        }
    }

    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn sent_at(mut self, ts: f64) -> Self {
        self.sent_at = Some(ts);
        self
    }
}

/// Why a waypoint was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Sender timestamp older than the last accepted sample.
    Stale,
    /// Non-finite coordinate.
    NonFinite,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: String,
    pub name: String,
    pub avatar: AvatarAppearance,
    prev: Vec2,
    target: Vec2,
    visual: Vec2,
    facing: Facing,
    progress: f32,
    is_moving: bool,
    last_update_ms: f64,
    last_sent_at: Option<f64>,
    liveness: Liveness,
}

impl RemoteEntity {
    /// Create a record resting at the first known position.
    pub fn spawn(id: impl Into<String>, waypoint: &Waypoint, now_ms: f64) -> Self {
        let at = Vec2::new(waypoint.x, waypoint.y);
        Self {
            id: id.into(),
            name: waypoint.name.clone().unwrap_or_default(),
            avatar: waypoint.avatar.clone().unwrap_or_default(),
            prev: at,
            target: at,
            visual: at,
            facing: waypoint.facing.unwrap_or_default(),
            progress: 1.0,
            is_moving: false,
            last_update_ms: now_ms,
            last_sent_at: waypoint.sent_at,
            liveness: Liveness::Active,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Position to draw this frame.
    pub fn position(&self) -> Vec2 {
        self.visual
    }
    pub fn prev(&self) -> Vec2 {
        self.prev
    }
    pub fn target(&self) -> Vec2 {
        self.target
    }
    pub fn facing(&self) -> Facing {
        self.facing
    }
    pub fn progress(&self) -> f32 {
        self.progress
    }
    pub fn is_moving(&self) -> bool {
        self.is_moving
    }
    pub fn last_update_ms(&self) -> f64 {
        self.last_update_ms
    }
    /// Liveness as of the most recent [`advanced`](Self::advanced) call.
    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    // ------------------------------------------------------------------
    // Broadcast
    // ------------------------------------------------------------------

    /// Start a new segment from the current *visual* position toward `waypoint`.
    ///
    /// Starting from the visual position rather than the old `prev` keeps
    /// motion continuous when samples arrive early or late.
    pub fn with_update(&self, waypoint: &Waypoint, now_ms: f64) -> Result<Self, Rejection> {
        if !waypoint.x.is_finite() || !waypoint.y.is_finite() {
            return Err(Rejection::NonFinite);
        }
        if let (Some(last), Some(ts)) = (self.last_sent_at, waypoint.sent_at) {
            if ts < last {
                return Err(Rejection::Stale);
            }
        }

        Ok(Self {
            id: self.id.clone(),
            name: waypoint.name.clone().unwrap_or_else(|| self.name.clone()),
            avatar: waypoint
                .avatar
                .clone()
                .unwrap_or_else(|| self.avatar.clone()),
            prev: self.visual,
            target: Vec2::new(waypoint.x, waypoint.y),
            visual: self.visual,
            facing: waypoint.facing.unwrap_or(self.facing),
            progress: 0.0,
            is_moving: true,
            last_update_ms: now_ms,
            last_sent_at: waypoint.sent_at.or(self.last_sent_at),
            // Reclassified by the next `advanced`, which is where the
            // transition back to active gets observed.
            liveness: self.liveness,
        })
    }

    // ------------------------------------------------------------------
    // Render tick
    // ------------------------------------------------------------------

    /// Advance the segment by one frame of `dt_sec` seconds.
    pub fn advanced(&self, dt_sec: f32, now_ms: f64, cfg: &SyncConfig) -> Self {
        let liveness = classify(now_ms, self.last_update_ms, cfg);
        match liveness {
            Liveness::Disconnected => Self {
                is_moving: false,
                liveness,
                ..self.clone()
            },
            Liveness::Idle => Self {
                visual: self.target,
                progress: 1.0,
                is_moving: false,
                liveness,
                ..self.clone()
            },
            Liveness::Active => {
                let dt_ms = if dt_sec.is_finite() {
                    dt_sec.max(0.0) * 1000.0
                } else {
                    0.0
                };
                let step = dt_ms / cfg.interpolation_duration_ms as f32;
                let progress = clamp(self.progress + step, 0.0, 1.0);
                let eased = smoothstep(progress);
                Self {
                    visual: Vec2::new(
                        lerp(self.prev.x, self.target.x, eased),
                        lerp(self.prev.y, self.target.y, eased),
                    ),
                    progress,
                    liveness,
                    ..self.clone()
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
