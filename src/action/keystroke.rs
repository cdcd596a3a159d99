//! Keystroke combination parsing and rendering.
//!
//! The wire form is the original `"ctrl+shift+k"` shape: tokens split on `+`,
//! lower-cased, every non-trailing token a modifier name, the final token the
//! primary key.

use std::fmt;
use std::str::FromStr;

use crate::error::{DeckError, Result};

/// A key combination: a set of modifiers plus one primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keystroke {
    /// Ctrl modifier held.
    pub ctrl: bool,
    /// Alt modifier held.
    pub alt: bool,
    /// Shift modifier held.
    pub shift: bool,
    /// Primary key name, lower-cased (e.g. "c", "enter", "f5").
    pub key: String,
}

impl Keystroke {
    /// Build a keystroke from a plain key with no modifiers.
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into().to_lowercase(),
            ..Self::default()
        }
    }
}

impl FromStr for Keystroke {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<String> = s.split('+').map(|t| t.trim().to_lowercase()).collect();

        let (key, modifiers) = tokens
            .split_last()
            .ok_or_else(|| DeckError::Validation("empty keystroke".to_string()))?;
        if key.is_empty() {
            return Err(DeckError::Validation(
                "keystroke primary key is empty".to_string(),
            ));
        }

        let mut ks = Self {
            key: key.clone(),
            ..Self::default()
        };
        for m in modifiers {
            match m.as_str() {
                "ctrl" => ks.ctrl = true,
                "alt" => ks.alt = true,
                "shift" => ks.shift = true,
                other => {
                    return Err(DeckError::Validation(format!(
                        "unknown keystroke modifier '{other}' (expected ctrl, alt or shift)"
                    )))
                }
            }
        }
        Ok(ks)
    }
}

impl fmt::Display for Keystroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        write!(f, "{}", self.key)
    }
}
