//! Core plaza types shared across all modules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Sprite orientation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Facing::Up),
            "down" => Ok(Facing::Down),
            "left" => Ok(Facing::Left),
            "right" => Ok(Facing::Right),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Avatar appearance
// ---------------------------------------------------------------------------

/// Opaque avatar look, copied from the latest broadcast and never edited here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarAppearance {
    #[serde(default)]
    pub sprite: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Remaining game-defined keys (hat, accessory, …).
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Local entity
// ---------------------------------------------------------------------------

/// The avatar controlled by this client.  Written by local input only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalEntity {
    pub id: String,
    pub name: String,
    pub avatar: AvatarAppearance,
    pub position: Vec2,
    pub facing: Facing,
    pub is_moving: bool,
}

impl LocalEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// UI flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiFlags {
    /// Chat input has keyboard focus; movement keys are suspended.
    pub chat_focused: bool,
    /// Draw display names above avatars.
    pub show_names: bool,
    /// Draw disconnected avatars (greyed) instead of hiding them.
    pub show_disconnected: bool,
}

impl Default for UiFlags {
    fn default() -> Self {
        Self {
            chat_focused: false,
            show_names: true,
            show_disconnected: true,
        }
    }
}
