//! Action model: the atomic steps a button can trigger and their validation.
//!
//! An [`Action`] is either a single [`Step`] or a macro, an ordered sequence
//! of steps. Macro steps are `Step` values by construction, so a macro can
//! never contain another macro and the recursion class is eliminated at the
//! type level.
//!
//! The configuration wire form matches the persisted document:
//! `{"type": "keystroke", "value": "ctrl+c"}`, with a macro's value being a
//! list of step objects. Conversion happens through
//! [`Action::from_config_value`] / [`Action::to_config_value`] rather than
//! serde derives so load-time repair can degrade broken values instead of
//! failing the whole document.

mod keystroke;

pub use keystroke::Keystroke;

use serde_json::{json, Value};

use crate::error::{DeckError, Result};

/// A single executable step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Step {
    /// No-op; the default binding.
    #[default]
    None,
    /// Open a URL in the default browser.
    Link(String),
    /// Launch an executable.
    Exe(String),
    /// Open a target file with a specific application.
    OpenWith { app: String, target: String },
    /// Send a key combination.
    Keystroke(Keystroke),
    /// Type a literal string.
    TypeText(String),
    /// Block the executing context for this many milliseconds.
    Delay(u64),
    /// Cycle the active profile to the next one.
    SwitchProfile,
}

/// Value separator for the `open_with` wire form (`app_path|target_path`).
const OPEN_WITH_SEPARATOR: char = '|';

impl Step {
    /// Decode a step from its configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::Validation`] for a missing/unknown type tag, an
    /// empty keystroke key, a non-numeric delay, an `open_with` value missing
    /// its separator, or a nested macro.
    pub fn from_config_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| DeckError::Validation("action must be an object".to_string()))?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DeckError::Validation("action is missing a type".to_string()))?;
        let raw = obj.get("value");
        let text = || raw.and_then(Value::as_str).unwrap_or("").to_string();

        match kind {
            "none" => Ok(Self::None),
            "link" => Ok(Self::Link(text())),
            "exe" => Ok(Self::Exe(text())),
            "open_with" => {
                let value = text();
                let (app, target) =
                    value.split_once(OPEN_WITH_SEPARATOR).ok_or_else(|| {
                        DeckError::Validation(
                            "open_with value is missing the 'app|target' separator".to_string(),
                        )
                    })?;
                Ok(Self::OpenWith {
                    app: app.to_string(),
                    target: target.to_string(),
                })
            }
            "keystroke" => Ok(Self::Keystroke(text().parse()?)),
            "typetext" => Ok(Self::TypeText(text())),
            "delay" => parse_delay_ms(raw).map(Self::Delay),
            "switch_profile" => Ok(Self::SwitchProfile),
            "macro" => Err(DeckError::Validation(
                "a macro step cannot contain another macro".to_string(),
            )),
            other => Err(DeckError::Validation(format!(
                "unknown action type '{other}'"
            ))),
        }
    }

    /// Encode this step to its configuration value.
    pub fn to_config_value(&self) -> Value {
        match self {
            Self::None => json!({"type": "none", "value": ""}),
            Self::Link(url) => json!({"type": "link", "value": url}),
            Self::Exe(path) => json!({"type": "exe", "value": path}),
            Self::OpenWith { app, target } => {
                json!({"type": "open_with", "value": format!("{app}{OPEN_WITH_SEPARATOR}{target}")})
            }
            Self::Keystroke(ks) => json!({"type": "keystroke", "value": ks.to_string()}),
            Self::TypeText(text) => json!({"type": "typetext", "value": text}),
            Self::Delay(ms) => json!({"type": "delay", "value": ms}),
            Self::SwitchProfile => json!({"type": "switch_profile", "value": ""}),
        }
    }

    /// Validate the step definition (configuration time, not execution time).
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Keystroke(ks) if ks.key.is_empty() => Err(DeckError::Validation(
                "keystroke primary key is empty".to_string(),
            )),
            Self::OpenWith { app, target } if app.is_empty() || target.is_empty() => {
                Err(DeckError::Validation(
                    "open_with needs both an application and a target path".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::Link(url) => format!("link: {}", truncate(url, 40)),
            Self::Exe(path) => {
                let name = std::path::Path::new(path)
                    .file_name()
                    .map_or_else(|| path.clone(), |n| n.to_string_lossy().into_owned());
                format!("exe: {name}")
            }
            Self::OpenWith { app, target } => format!("open_with: {app} -> {target}"),
            Self::Keystroke(ks) => format!("keystroke: {ks}"),
            Self::TypeText(text) => format!("typetext: {}", truncate(text, 20)),
            Self::Delay(ms) => format!("delay: {ms} ms"),
            Self::SwitchProfile => "switch_profile".to_string(),
        }
    }
}

/// An action bound to a button gesture: one step, or an ordered macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A single step.
    Step(Step),
    /// An ordered sequence of steps executed with an inter-step settle delay.
    Macro(Vec<Step>),
}

impl Default for Action {
    fn default() -> Self {
        Self::Step(Step::None)
    }
}

impl Action {
    /// True if this action is the `none` no-op.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::Step(Step::None))
    }

    /// Decode an action from its configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::Validation`] on any malformed definition; see
    /// [`Step::from_config_value`].
    pub fn from_config_value(value: &Value) -> Result<Self> {
        let kind = value
            .as_object()
            .and_then(|o| o.get("type"))
            .and_then(Value::as_str);
        if kind == Some("macro") {
            let steps = value
                .get("value")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    DeckError::Validation("macro value must be a list of steps".to_string())
                })?;
            let steps = steps
                .iter()
                .map(Step::from_config_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(Self::Macro(steps))
        } else {
            Step::from_config_value(value).map(Self::Step)
        }
    }

    /// Encode this action to its configuration value.
    pub fn to_config_value(&self) -> Value {
        match self {
            Self::Step(step) => step.to_config_value(),
            Self::Macro(steps) => {
                let steps: Vec<Value> = steps.iter().map(Step::to_config_value).collect();
                json!({"type": "macro", "value": steps})
            }
        }
    }

    /// Validate the action definition.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Step(step) => step.validate(),
            Self::Macro(steps) => steps.iter().try_for_each(Step::validate),
        }
    }

    /// Short human-readable label, e.g. for binding listings.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Step(step) => step.describe(),
            Self::Macro(steps) => format!("macro: {} steps", steps.len()),
        }
    }
}

/// Decode a delay value: a non-negative integer, or the original UI's numeric
/// string form (`"500"`).
fn parse_delay_ms(raw: Option<&Value>) -> Result<u64> {
    let invalid =
        || DeckError::Validation("delay value must be a non-negative integer".to_string());
    match raw {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
