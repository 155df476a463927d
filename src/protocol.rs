//! `plaza.*` wire protocol consumed from the presence channel.
//!
//! This module owns **every message that crosses the channel boundary** and
//! the single function, [`parse_event`], that turns an untrusted payload into
//! a typed [`ChannelEvent`].  Nothing deeper in the crate looks at raw JSON.
//!
//! ## Subjects
//!
//! | Subject prefix    | Payload           | Cadence                     |
//! |-------------------|-------------------|-----------------------------|
//! | `plaza.waypoint`  | [`WaypointMsg`]   | ~10 Hz per moving sender    |
//! | `plaza.presence`  | [`PresenceMsg`]   | on join / leave             |
//! | `plaza.chat`      | [`ChatMsg`]       | on send                     |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Coordinates must be finite; a sample that is not is rejected whole.
//! 3. Ordering and delivery guarantees are the channel's business; the store
//!    discards stale samples itself.

use serde::{Deserialize, Serialize};

use crate::entity::Waypoint;
use crate::error::ProtocolError;
use crate::types::{AvatarAppearance, Facing};

// ---------------------------------------------------------------------------
// Waypoints  (subject: plaza.waypoint)
// ---------------------------------------------------------------------------

/// One position sample broadcast by a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointMsg {
    pub participant_id: String,
    pub room_id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    /// Sender clock (ms).  Only compared against the same sender's samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarAppearance>,
}

// ---------------------------------------------------------------------------
// Presence  (subject: plaza.presence)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Joined,
    Left,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMsg {
    pub participant_id: String,
    pub room_id: String,
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarAppearance>,
    /// Spawn position, if the sender already knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
}

// ---------------------------------------------------------------------------
// Chat  (subject: plaza.chat)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMsg {
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub phrase: String,
}

// ---------------------------------------------------------------------------
// Validated events
// ---------------------------------------------------------------------------

/// A channel message after validation.  This is what the store consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Waypoint {
        room_id: String,
        participant_id: String,
        waypoint: Waypoint,
    },
    Joined {
        room_id: String,
        participant_id: String,
        /// Present when the join carried a position.
        spawn: Option<Waypoint>,
    },
    Left {
        room_id: String,
        participant_id: String,
    },
    Chat {
        room_id: Option<String>,
        participant_id: String,
        phrase: String,
    },
}

impl ChannelEvent {
    pub fn participant_id(&self) -> &str {
        match self {
            ChannelEvent::Waypoint { participant_id, .. }
            | ChannelEvent::Joined { participant_id, .. }
            | ChannelEvent::Left { participant_id, .. }
            | ChannelEvent::Chat { participant_id, .. } => participant_id,
        }
    }
}

/// Validate a raw channel message.
pub fn parse_event(subject: &str, payload: &[u8]) -> Result<ChannelEvent, ProtocolError> {
    match subject {
        s if s.starts_with(subjects::WAYPOINT) => {
            let msg: WaypointMsg = serde_json::from_slice(payload)?;
            require_id(&msg.participant_id)?;
            require_finite("x", msg.x)?;
            require_finite("y", msg.y)?;
            if let Some(ts) = msg.timestamp {
                if !ts.is_finite() {
                    return Err(ProtocolError::NonFinite { field: "timestamp" });
                }
            }
            Ok(ChannelEvent::Waypoint {
                room_id: msg.room_id,
                participant_id: msg.participant_id,
                waypoint: Waypoint {
                    x: msg.x,
                    y: msg.y,
                    facing: msg.facing,
                    sent_at: msg.timestamp,
                    name: msg.name,
                    avatar: msg.avatar,
                },
            })
        }
        s if s.starts_with(subjects::PRESENCE) => {
            let msg: PresenceMsg = serde_json::from_slice(payload)?;
            require_id(&msg.participant_id)?;
            match msg.status {
                PresenceStatus::Left => Ok(ChannelEvent::Left {
                    room_id: msg.room_id,
                    participant_id: msg.participant_id,
                }),
                PresenceStatus::Joined => {
                    let spawn = match (msg.x, msg.y) {
                        (Some(x), Some(y)) => {
                            require_finite("x", x)?;
                            require_finite("y", y)?;
                            Some(Waypoint {
                                x,
                                y,
                                facing: msg.facing,
                                sent_at: None,
                                name: msg.name,
                                avatar: msg.avatar,
                            })
                        }
                        _ => None,
                    };
                    Ok(ChannelEvent::Joined {
                        room_id: msg.room_id,
                        participant_id: msg.participant_id,
                        spawn,
                    })
                }
            }
        }
        s if s.starts_with(subjects::CHAT) => {
            let msg: ChatMsg = serde_json::from_slice(payload)?;
            require_id(&msg.participant_id)?;
            if msg.phrase.trim().is_empty() {
                return Err(ProtocolError::EmptyPhrase);
            }
            Ok(ChannelEvent::Chat {
                room_id: msg.room_id,
                participant_id: msg.participant_id,
                phrase: msg.phrase,
            })
        }
        other => Err(ProtocolError::UnknownSubject(other.to_string())),
    }
}

fn require_id(id: &str) -> Result<(), ProtocolError> {
    if id.trim().is_empty() {
        Err(ProtocolError::EmptyParticipantId)
    } else {
        Ok(())
    }
}

fn require_finite(field: &'static str, v: f32) -> Result<(), ProtocolError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite { field })
    }
}

// ---------------------------------------------------------------------------
// Subject helpers
// ---------------------------------------------------------------------------

/// Channel subjects, as prefixes.  Deployments may append a room suffix
/// (`plaza.waypoint.lobby`); matching is by prefix.
pub mod subjects {
    pub const WAYPOINT: &str = "plaza.waypoint";
    pub const PRESENCE: &str = "plaza.presence";
    pub const CHAT: &str = "plaza.chat";
}
