//! Liveness classification from elapsed time since the last waypoint.
//!
//! | Age of last waypoint              | Liveness       |
//! |-----------------------------------|----------------|
//! | `age <= idle`                     | `Active`       |
//! | `idle < age <= disconnect`        | `Idle`         |
//! | `age > disconnect`                | `Disconnected` |

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Active,
    Idle,
    Disconnected,
}

pub fn classify(now_ms: f64, last_update_ms: f64, cfg: &SyncConfig) -> Liveness {
    let age = now_ms - last_update_ms;
    if age > cfg.disconnect_timeout_ms {
        Liveness::Disconnected
    } else if age > cfg.idle_timeout_ms {
        Liveness::Idle
    } else {
        Liveness::Active
    }
}

pub fn is_idle(now_ms: f64, last_update_ms: f64, cfg: &SyncConfig) -> bool {
    classify(now_ms, last_update_ms, cfg) == Liveness::Idle
}

pub fn is_disconnected(now_ms: f64, last_update_ms: f64, cfg: &SyncConfig) -> bool {
    classify(now_ms, last_update_ms, cfg) == Liveness::Disconnected
}
