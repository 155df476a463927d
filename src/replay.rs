//! Trace replay: drives a [`SyncStore`] from a recorded channel trace.
//!
//! A trace is JSON lines, one channel message per line:
//!
//! ```text
//! {"at_ms": 0,   "subject": "plaza.presence", "payload": {"participant_id": "u1", "room_id": "lobby", "status": "joined", "x": 0, "y": 0}}
//! {"at_ms": 100, "subject": "plaza.waypoint", "payload": {"participant_id": "u1", "room_id": "lobby", "x": 4, "y": 0, "facing": "right"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.  Messages are fed in
//! `at_ms` order against a [`ManualClock`]; between messages the store is
//! ticked at a fixed frame rate exactly as a render loop would.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::protocol::parse_event;
use crate::store::{Frame, StoreEvent, SyncStore};

// ---------------------------------------------------------------------------
// Trace format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Arrival time on the receiving client's clock.
    pub at_ms: f64,
    pub subject: String,
    pub payload: serde_json::Value,
}

/// Parse a JSON-lines trace and sort it by arrival time.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEntry>> {
    let mut entries = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry: TraceEntry = serde_json::from_str(line)
            .with_context(|| format!("trace line {} is not a valid entry", n + 1))?;
        entries.push(entry);
    }
    entries.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Replayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub frames: u64,
    pub applied: u64,
    pub dropped: u64,
    pub malformed: u64,
}

/// One rendered frame plus the notifications raised while producing it.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayFrame {
    pub index: u64,
    pub frame: Frame,
    pub events: Vec<StoreEvent>,
}

pub struct Replayer {
    store: SyncStore<ManualClock>,
    clock: ManualClock,
    entries: VecDeque<TraceEntry>,
    frame_ms: f64,
    end_ms: f64,
    next_frame: u64,
    stats: ReplayStats,
}

impl Replayer {
    /// `end_ms` defaults to the last message plus the idle timeout, so the
    /// final frames show every avatar settled.
    pub fn new(
        store: SyncStore<ManualClock>,
        clock: ManualClock,
        entries: Vec<TraceEntry>,
        fps: f32,
        end_ms: Option<f64>,
    ) -> Self {
        let frame_ms = 1000.0 / f64::from(fps.max(1.0));
        let last_at = entries.last().map_or(0.0, |e| e.at_ms);
        let end_ms = end_ms.unwrap_or(last_at + store.config().idle_timeout_ms + frame_ms);
        Self {
            store,
            clock,
            entries: entries.into(),
            frame_ms,
            end_ms,
            next_frame: 0,
            stats: ReplayStats::default(),
        }
    }

    pub fn store(&self) -> &SyncStore<ManualClock> {
        &self.store
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.next_frame as f64 * self.frame_ms > self.end_ms
    }

    /// Deliver every message due by the next frame, then render it.
    pub fn step(&mut self) -> Option<ReplayFrame> {
        if self.is_finished() {
            return None;
        }
        let index = self.next_frame;
        let frame_at = index as f64 * self.frame_ms;
        self.next_frame += 1;

        let store = &mut self.store;

        while self.entries.front().is_some_and(|e| e.at_ms <= frame_at) {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            self.clock.set(entry.at_ms);
            let payload = entry.payload.to_string();
            match parse_event(&entry.subject, payload.as_bytes()) {
                Ok(event) => {
                    if store.apply_event(event) {
                        self.stats.applied += 1;
                    } else {
                        self.stats.dropped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(at_ms = entry.at_ms, subject = %entry.subject, "malformed message: {}", e);
                    self.stats.malformed += 1;
                }
            }
        }

        self.clock.set(frame_at);
        let dt = if index == 0 {
            0.0
        } else {
            (self.frame_ms / 1000.0) as f32
        };
        let events = store.tick(dt);
        let frame = store.frame();
        self.stats.frames += 1;

        tracing::debug!(
            frame = index,
            now_ms = frame_at,
            remotes = frame.remotes.len(),
            "rendered frame"
        );

        Some(ReplayFrame {
            index,
            frame,
            events,
        })
    }
}

/// Run the replay to completion, optionally pacing frames in wall time.
pub async fn run(
    replayer: &mut Replayer,
    pacing: Option<Duration>,
    mut sink: impl FnMut(&ReplayFrame),
) -> ReplayStats {
    let mut interval = pacing.map(tokio::time::interval);
    loop {
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
        match replayer.step() {
            Some(frame) => sink(&frame),
            None => break,
        }
    }
    replayer.stats()
}
