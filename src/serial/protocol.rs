//! Hardware line protocol: one event per line, `BUTTON_<n>_<PRESS|HOLD>`.

use std::fmt;

use crate::profile::{ButtonId, Gesture};

/// A decoded hardware button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub gesture: Gesture,
}

impl ButtonEvent {
    /// Parse one trimmed event line. Returns `None` for anything that is not
    /// exactly `BUTTON_<1..9>_<PRESS|HOLD>`; the caller logs and skips.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split('_');
        let prefix = parts.next()?;
        let id = parts.next()?;
        let gesture = parts.next()?;
        if prefix != "BUTTON" || parts.next().is_some() {
            return None;
        }
        let button = ButtonId::new(id.parse().ok()?)?;
        let gesture = Gesture::parse(gesture)?;
        Some(Self { button, gesture })
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BUTTON_{}_{}", self.button, self.gesture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_valid_events() {
        for n in 1..=9u8 {
            for gesture in ["PRESS", "HOLD"] {
                let line = format!("BUTTON_{n}_{gesture}");
                let event = ButtonEvent::parse(&line).unwrap();
                assert_eq!(event.button.get(), n);
                assert_eq!(event.to_string(), line);
            }
        }
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in [
            "",
            "BUTTON",
            "BUTTON_1",
            "BUTTON_1_TAP",
            "BUTTON_0_PRESS",
            "BUTTON_10_PRESS",
            "BUTTON_x_PRESS",
            "KNOB_1_PRESS",
            "BUTTON_1_PRESS_EXTRA",
            "button_1_press",
        ] {
            assert!(ButtonEvent::parse(line).is_none(), "accepted {line:?}");
        }
    }
}
