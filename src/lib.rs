//! Plaza Sync
//!
//! Client-side synchronisation for a shared 2D plaza: remote avatars arrive
//! as sparse ~10 Hz waypoints and leave as smooth per-frame positions, with
//! liveness derived from silence and speech bubbles on a timed phase machine.
//!
//! ## Architecture
//!
//! ```text
//! channel ──► protocol::parse_event ──► SyncStore::apply_event
//!                                          ├── RemoteEntity  (entity.rs)   ← segment state
//!                                          └── Bubble        (bubble.rs)   ← timed overlay
//! render  ──► SyncStore::tick(dt) ──► SyncStore::frame() ──► renderer
//!                 ├── interp    lerp / clamp / smoothstep
//!                 └── liveness  active / idle / disconnected
//! ```
//!
//! Every threshold lives in one [`SyncConfig`].  Time comes from an injected
//! [`Clock`], so tests and the replay tool drive the store deterministically.

// Engine (always available, no CLI dependencies).
pub mod bubble;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod interp;
pub mod liveness;
pub mod protocol;
pub mod store;
pub mod types;

// Trace replay driver requires the `cli` feature.
#[cfg(feature = "cli")]
pub mod replay;

pub use bubble::{Bubble, BubblePhase, BubbleView};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use entity::{RemoteEntity, Waypoint};
pub use error::{ConfigError, ProtocolError};
pub use liveness::Liveness;
pub use protocol::{parse_event, ChannelEvent};
pub use store::{Frame, StoreEvent, SyncStore};
pub use types::{AvatarAppearance, Facing, LocalEntity, UiFlags, Vec2};
