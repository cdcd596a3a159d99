//! Per-button cooldown gate for bouncing or duplicated hardware events.
//!
//! The hardware may emit several transitions for one physical press; this
//! gate is the sole defense. The ledger is a fixed table with one slot per
//! button, so it never grows.

use std::time::{Duration, Instant};

use crate::profile::{ButtonId, BUTTON_COUNT};

/// Minimum time between honored events for the same button.
pub const COOLDOWN: Duration = Duration::from_millis(500);

/// Fixed-size last-fire ledger, one slot per button id.
#[derive(Debug, Clone, Default)]
pub struct DebounceGate {
    last_fire: [Option<Instant>; BUTTON_COUNT],
}

impl DebounceGate {
    /// Create a gate with no recorded fires.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an event iff more than [`COOLDOWN`] has elapsed since the last
    /// admitted event for the same button. Admission records the fire time;
    /// rejection leaves the ledger untouched.
    pub fn admit(&mut self, button: ButtonId, now: Instant) -> bool {
        let slot = &mut self.last_fire[button.index()];
        if let Some(last) = *slot {
            if now.saturating_duration_since(last) <= COOLDOWN {
                return false;
            }
        }
        *slot = Some(now);
        true
    }
}
