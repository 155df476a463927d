//! `performance.now()` as a [`Clock`].

use plaza_sync::clock::Clock;

/// Reads `performance.now()`, or `Date.now()` where no window exists
/// (workers without `Performance`, Node-based test runners).
///
/// The source is fixed per environment, so readings stay on one time base.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceClock;

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}
