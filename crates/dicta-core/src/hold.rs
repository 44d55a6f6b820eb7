//! Tap/hold disambiguation for the trigger key.
//!
//! A press only becomes a recording gesture once it has been held past the
//! configured threshold. The poller ticks at a short fixed interval and the
//! trigger latches exactly once per press.

use std::time::{Duration, Instant};

use crate::state::InputState;

/// Poll interval for the per-press hold poller thread.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Ephemeral record of one trigger-key press. Created on key-down,
/// destroyed on key-up.
#[derive(Debug, Clone)]
pub struct HoldSession {
    /// When the trigger key went down.
    pub pressed_at: Instant,
    /// Whether the translate modifier is held alongside the trigger key.
    pub modifier_held: bool,
    /// Latch: set once a recording state has been entered for this press.
    pub triggered: bool,
}

impl HoldSession {
    pub fn new(modifier_held: bool) -> Self {
        Self {
            pressed_at: Instant::now(),
            modifier_held,
            triggered: false,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.pressed_at)
    }
}

/// Outcome of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldDecision {
    /// Below threshold, keep polling.
    KeepPolling,
    /// Session gone or already triggered, the poller must exit.
    StopPolling,
    /// Threshold crossed: latch and start recording.
    Trigger { translate: bool },
}

/// Decide what the poller should do for the current tick.
///
/// The trigger fires on the first tick where the elapsed hold time reaches
/// the threshold and recording is permitted; `modifier_held` at that
/// instant selects the mode. A press released before the threshold never
/// reaches `Trigger`.
pub fn evaluate(
    session: Option<&HoldSession>,
    state: &InputState,
    threshold: Duration,
    now: Instant,
) -> HoldDecision {
    let Some(session) = session else {
        return HoldDecision::StopPolling;
    };
    if session.triggered {
        return HoldDecision::StopPolling;
    }
    if session.elapsed(now) < threshold {
        return HoldDecision::KeepPolling;
    }
    if !state.can_start_recording() {
        // Already recording through another path; keep waiting rather
        // than double-starting.
        return HoldDecision::KeepPolling;
    }
    HoldDecision::Trigger {
        translate: session.modifier_held,
    }
}
