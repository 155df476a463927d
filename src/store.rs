//! `SyncStore`: the shared collection of remote avatars, bubbles and the
//! local avatar, plus the entry points the rest of the client calls.
//!
//! ## Threading model
//!
//! The store is driven from one thread.  Channel callbacks call
//! [`SyncStore::apply_event`]; the render loop calls [`SyncStore::tick`] once
//! per frame and then reads [`SyncStore::frame`].  Every record update swaps a
//! whole [`RemoteEntity`] value, so a frame never observes a partial write.
//!
//! ## Lifetimes
//!
//! | Thing          | Created by                     | Removed by                       |
//! |----------------|--------------------------------|----------------------------------|
//! | RemoteEntity   | first waypoint / join with pos | leave event, room change         |
//! | Bubble         | chat event / `say`             | expiry in `tick`, replace, leave |
//!
//! Liveness never removes a record; a disconnected avatar stays until the
//! channel says it left.

use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;

use crate::bubble::{bound_phrase, Bubble, BubbleView};
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::entity::{RemoteEntity, Waypoint};
use crate::liveness::{classify, Liveness};
use crate::protocol::ChannelEvent;
use crate::types::{Facing, LocalEntity, UiFlags, Vec2};

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    RoomChanged {
        room_id: String,
    },
    EntityJoined {
        participant_id: String,
    },
    /// Presence join that carried no position; the record waits for the
    /// first waypoint.
    ParticipantAnnounced {
        participant_id: String,
    },
    EntityLeft {
        participant_id: String,
    },
    LivenessChanged {
        participant_id: String,
        from: Liveness,
        to: Liveness,
    },
    BubbleStarted {
        owner_id: String,
    },
    /// Emitted exactly once per bubble that runs its full course.
    BubbleExpired {
        owner_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreEvent)>;

// ---------------------------------------------------------------------------
// Frame snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteView {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub is_moving: bool,
    pub is_idle: bool,
    pub is_disconnected: bool,
    pub bubble: Option<BubbleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalView {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub is_moving: bool,
    pub bubble: Option<BubbleView>,
}

/// Everything the renderer draws for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub now_ms: f64,
    pub room_id: Option<String>,
    pub local: LocalView,
    /// Sorted by id so output is stable across frames.
    pub remotes: Vec<RemoteView>,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: String,
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SyncStore<C: Clock> {
    config: SyncConfig,
    clock: C,
    room: Option<Room>,
    local: LocalEntity,
    remotes: HashMap<String, RemoteEntity>,
    bubbles: HashMap<String, Bubble>,
    ui: UiFlags,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<C: Clock> SyncStore<C> {
    pub fn new(config: SyncConfig, clock: C, local: LocalEntity) -> Self {
        Self {
            config,
            clock,
            room: None,
            local,
            remotes: HashMap::new(),
            bubbles: HashMap::new(),
            ui: UiFlags::default(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    // -----------------------------------------------------------------------
    // Subscribe / notify
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: &StoreEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    // -----------------------------------------------------------------------
    // Room
    // -----------------------------------------------------------------------

    /// Switch rooms.  Every remote record and bubble from the old room is dropped.
    pub fn enter_room(&mut self, room_id: impl Into<String>, metadata: serde_json::Value) {
        let room_id = room_id.into();
        info!(
            "Entering room '{}' (dropping {} remote entities)",
            room_id,
            self.remotes.len()
        );
        self.remotes.clear();
        self.bubbles.clear();
        self.room = Some(Room {
            id: room_id.clone(),
            metadata,
        });
        self.emit(&StoreEvent::RoomChanged { room_id });
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room.as_ref().map(|r| r.id.as_str())
    }

    fn in_room(&self, room_id: &str) -> bool {
        self.room_id() == Some(room_id)
    }

    // -----------------------------------------------------------------------
    // Channel input
    // -----------------------------------------------------------------------

    /// Apply one validated channel event.  Returns `false` if it was dropped.
    pub fn apply_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Waypoint {
                room_id,
                participant_id,
                waypoint,
            } => self.apply_waypoint(&room_id, &participant_id, &waypoint),
            ChannelEvent::Joined {
                room_id,
                participant_id,
                spawn,
            } => self.join(&room_id, &participant_id, spawn.as_ref()),
            ChannelEvent::Left {
                room_id,
                participant_id,
            } => {
                if !self.in_room(&room_id) {
                    debug!("Ignoring leave of {} for room '{}'", participant_id, room_id);
                    return false;
                }
                self.remove_entity(&participant_id)
            }
            ChannelEvent::Chat {
                room_id,
                participant_id,
                phrase,
            } => {
                if let Some(room_id) = room_id {
                    if !self.in_room(&room_id) {
                        debug!("Ignoring chat from {} for room '{}'", participant_id, room_id);
                        return false;
                    }
                }
                self.add_bubble(&participant_id, &phrase)
            }
        }
    }

    /// Feed one position sample for a remote participant.
    pub fn apply_waypoint(&mut self, room_id: &str, participant_id: &str, waypoint: &Waypoint) -> bool {
        if participant_id == self.local.id {
            return false;
        }
        if !self.in_room(room_id) {
            debug!("Dropping waypoint from {} for room '{}'", participant_id, room_id);
            return false;
        }
        let now = self.clock.now_ms();

        let updated = self
            .remotes
            .get(participant_id)
            .map(|existing| existing.with_update(waypoint, now));
        match updated {
            Some(Ok(next)) => {
                self.remotes.insert(participant_id.to_string(), next);
                true
            }
            Some(Err(reason)) => {
                debug!("Dropping waypoint from {}: {:?}", participant_id, reason);
                false
            }
            None => self.spawn(participant_id, waypoint, now),
        }
    }

    /// A participant announced itself.  Creates the record only if a position
    /// came with it; otherwise subscribers are told and nothing is stored.
    pub fn join(&mut self, room_id: &str, participant_id: &str, spawn: Option<&Waypoint>) -> bool {
        if participant_id == self.local.id || !self.in_room(room_id) {
            return false;
        }
        if self.remotes.contains_key(participant_id) {
            return false;
        }
        match spawn {
            Some(waypoint) => {
                let now = self.clock.now_ms();
                self.spawn(participant_id, waypoint, now)
            }
            None => {
                debug!("{} joined without a position; waiting for first waypoint", participant_id);
                self.emit(&StoreEvent::ParticipantAnnounced {
                    participant_id: participant_id.to_string(),
                });
                true
            }
        }
    }

    fn spawn(&mut self, participant_id: &str, waypoint: &Waypoint, now: f64) -> bool {
        if !waypoint.x.is_finite() || !waypoint.y.is_finite() {
            debug!("Refusing to spawn {} at a non-finite position", participant_id);
            return false;
        }
        let record = RemoteEntity::spawn(participant_id, waypoint, now);
        info!(
            "Remote entity {} appeared at {}",
            participant_id,
            record.position()
        );
        self.remotes.insert(participant_id.to_string(), record);
        self.emit(&StoreEvent::EntityJoined {
            participant_id: participant_id.to_string(),
        });
        true
    }

    /// Drop a participant and its bubble.  Unknown ids are a no-op.
    pub fn remove_entity(&mut self, participant_id: &str) -> bool {
        let removed = self.remotes.remove(participant_id).is_some();
        self.bubbles.remove(participant_id);
        if removed {
            info!("Remote entity {} left", participant_id);
            self.emit(&StoreEvent::EntityLeft {
                participant_id: participant_id.to_string(),
            });
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Render tick
    // -----------------------------------------------------------------------

    /// Advance every remote record by `dt_sec` and retire expired bubbles.
    ///
    /// Returns the notifications produced by this frame; subscribers receive
    /// the same events.
    pub fn tick(&mut self, dt_sec: f32) -> Vec<StoreEvent> {
        let now = self.clock.now_ms();

        let mut ids: Vec<String> = self.remotes.keys().cloned().collect();
        ids.sort();
        let mut events: Vec<StoreEvent> = ids
            .iter()
            .filter_map(|id| self.advance_record(id, dt_sec, now))
            .collect();

        let config = self.config;
        let mut expired: Vec<String> = self
            .bubbles
            .iter()
            .filter(|(_, b)| b.is_expired(now, &config))
            .map(|(owner, _)| owner.clone())
            .collect();
        expired.sort();
        for owner_id in expired {
            self.bubbles.remove(&owner_id);
            events.push(StoreEvent::BubbleExpired { owner_id });
        }

        for event in &events {
            self.emit(event);
        }
        events
    }

    /// Advance a single record.  Unknown ids are a no-op.
    ///
    /// A liveness change is sent to subscribers and returned, exactly as
    /// [`tick`](Self::tick) would report it.
    pub fn advance_entity(&mut self, participant_id: &str, dt_sec: f32) -> Option<StoreEvent> {
        let now = self.clock.now_ms();
        let event = self.advance_record(participant_id, dt_sec, now)?;
        self.emit(&event);
        Some(event)
    }

    /// Swap in the advanced record; returns the liveness transition, if any.
    fn advance_record(&mut self, participant_id: &str, dt_sec: f32, now: f64) -> Option<StoreEvent> {
        let record = self.remotes.get_mut(participant_id)?;
        let next = record.advanced(dt_sec, now, &self.config);
        let (from, to) = (record.liveness(), next.liveness());
        *record = next;
        (from != to).then(|| StoreEvent::LivenessChanged {
            participant_id: participant_id.to_string(),
            from,
            to,
        })
    }

    // -----------------------------------------------------------------------
    // Bubbles
    // -----------------------------------------------------------------------

    /// Show `phrase` over `owner_id`, replacing any current bubble.
    ///
    /// The owner must be the local avatar or a known remote one.
    pub fn add_bubble(&mut self, owner_id: &str, phrase: &str) -> bool {
        if owner_id != self.local.id && !self.remotes.contains_key(owner_id) {
            debug!("Ignoring bubble for unknown participant {}", owner_id);
            return false;
        }
        let Some(phrase) = bound_phrase(phrase, self.config.max_phrase_chars) else {
            return false;
        };
        let now = self.clock.now_ms();
        self.bubbles.insert(
            owner_id.to_string(),
            Bubble::new(owner_id, phrase, now, &self.config),
        );
        self.emit(&StoreEvent::BubbleStarted {
            owner_id: owner_id.to_string(),
        });
        true
    }

    /// Local chat.
    pub fn say(&mut self, phrase: &str) -> bool {
        let id = self.local.id.clone();
        self.add_bubble(&id, phrase)
    }

    /// Remove a bubble early.  No expiry notification is sent.
    pub fn remove_bubble(&mut self, owner_id: &str) -> bool {
        self.bubbles.remove(owner_id).is_some()
    }

    pub fn bubble(&self, owner_id: &str) -> Option<&Bubble> {
        self.bubbles.get(owner_id)
    }

    /// Current bubble overlay for `owner_id`, or `None` if absent or expired.
    pub fn bubble_view(&self, owner_id: &str) -> Option<BubbleView> {
        let now = self.clock.now_ms();
        self.bubbles
            .get(owner_id)
            .and_then(|b| b.view(now, &self.config))
    }

    // -----------------------------------------------------------------------
    // Remote queries
    // -----------------------------------------------------------------------

    pub fn remote(&self, participant_id: &str) -> Option<&RemoteEntity> {
        self.remotes.get(participant_id)
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.remotes.values()
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    /// Liveness computed against the clock right now.
    pub fn liveness(&self, participant_id: &str) -> Option<Liveness> {
        let now = self.clock.now_ms();
        self.remotes
            .get(participant_id)
            .map(|r| classify(now, r.last_update_ms(), &self.config))
    }

    pub fn is_idle(&self, participant_id: &str) -> bool {
        self.liveness(participant_id) == Some(Liveness::Idle)
    }

    pub fn is_disconnected(&self, participant_id: &str) -> bool {
        self.liveness(participant_id) == Some(Liveness::Disconnected)
    }

    // -----------------------------------------------------------------------
    // Local entity + UI
    // -----------------------------------------------------------------------

    pub fn local(&self) -> &LocalEntity {
        &self.local
    }

    /// Written by local input handling; never interpolated.
    pub fn set_local(&mut self, position: Vec2, facing: Facing, is_moving: bool) {
        if !position.is_finite() {
            return;
        }
        self.local.position = position;
        self.local.facing = facing;
        self.local.is_moving = is_moving;
    }

    pub fn ui(&self) -> &UiFlags {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiFlags {
        &mut self.ui
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    pub fn frame(&self) -> Frame {
        let now = self.clock.now_ms();
        let mut remotes: Vec<RemoteView> = self
            .remotes
            .values()
            .map(|r| {
                let liveness = classify(now, r.last_update_ms(), &self.config);
                let pos = r.position();
                RemoteView {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    x: pos.x,
                    y: pos.y,
                    facing: r.facing(),
                    is_moving: r.is_moving(),
                    is_idle: liveness == Liveness::Idle,
                    is_disconnected: liveness == Liveness::Disconnected,
                    bubble: self.bubble_view(&r.id),
                }
            })
            .collect();
        remotes.sort_by(|a, b| a.id.cmp(&b.id));

        Frame {
            now_ms: now,
            room_id: self.room_id().map(str::to_string),
            local: LocalView {
                id: self.local.id.clone(),
                name: self.local.name.clone(),
                x: self.local.position.x,
                y: self.local.position.y,
                facing: self.local.facing,
                is_moving: self.local.is_moving,
                bubble: self.bubble_view(&self.local.id),
            },
            remotes,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (SyncStore<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0.0);
        let mut s = SyncStore::new(
            SyncConfig::default(),
            clock.clone(),
            LocalEntity::new("me", "Me"),
        );
        s.enter_room("lobby", serde_json::Value::Null);
        (s, clock)
    }

    #[test]
    fn own_echo_is_ignored() {
        let (mut s, _) = store();
        assert!(!s.apply_waypoint("lobby", "me", &Waypoint::at(1.0, 1.0)));
        assert_eq!(s.remote_count(), 0);
    }

    #[test]
    fn no_room_rejects_everything() {
        let mut s = SyncStore::new(
            SyncConfig::default(),
            ManualClock::new(0.0),
            LocalEntity::new("me", "Me"),
        );
        assert!(!s.apply_waypoint("lobby", "u1", &Waypoint::at(1.0, 1.0)));
    }

    #[test]
    fn spawn_with_non_finite_position_refused() {
        let (mut s, _) = store();
        assert!(!s.apply_waypoint("lobby", "u1", &Waypoint::at(f32::NAN, 0.0)));
        assert_eq!(s.remote_count(), 0);
    }

    #[test]
    fn advance_unknown_is_noop() {
        let (mut s, _) = store();
        assert!(s.advance_entity("ghost", 0.016).is_none());
        assert_eq!(s.remote_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        use std::sync::{Arc, Mutex};
        let (mut s, _) = store();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let id = s.subscribe(move |_| *sink.lock().unwrap() += 1);

        s.apply_waypoint("lobby", "u1", &Waypoint::at(0.0, 0.0));
        assert_eq!(*seen.lock().unwrap(), 1);

        assert!(s.unsubscribe(id));
        assert!(!s.unsubscribe(id));
        s.apply_waypoint("lobby", "u2", &Waypoint::at(0.0, 0.0));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn set_local_rejects_non_finite() {
        let (mut s, _) = store();
        s.set_local(Vec2::new(4.0, 2.0), Facing::Up, true);
        s.set_local(Vec2::new(f32::NAN, 2.0), Facing::Left, false);
        assert_eq!(s.local().position, Vec2::new(4.0, 2.0));
        assert_eq!(s.local().facing, Facing::Up);
    }
}
