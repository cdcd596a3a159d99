//! Mock runner for unit testing.
//!
//! Records every capability call with a timestamp and supports assertions,
//! scripted foreground answers, and failure injection.
//!
//! # Example
//!
//! ```rust,ignore
//! use cdeck::exec::mock::{MockRunner, Operation};
//! use cdeck::exec::ActionRunner;
//!
//! let mock = MockRunner::new();
//! mock.open_url("https://example.com").unwrap();
//! mock.assert_operations(&[Operation::OpenUrl {
//!     url: "https://example.com".to_string(),
//! }]);
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use super::ActionRunner;
use crate::action::Keystroke;
use crate::error::{DeckError, Result};

/// Recorded capability call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    OpenUrl { url: String },
    Launch { path: String },
    OpenWith { app: String, target: String },
    Keystroke { combo: String },
    TypeText { text: String },
    ReadForeground,
}

/// Recording [`ActionRunner`] double.
#[derive(Debug, Default)]
pub struct MockRunner {
    ops: Mutex<Vec<(Instant, Operation)>>,
    /// One-shot scripted answers for foreground queries, consumed in order.
    foreground_script: Mutex<VecDeque<std::result::Result<String, String>>>,
    /// Sticky answer used when the script runs dry.
    foreground_default: Mutex<Option<String>>,
    /// Substrings that make an execution call fail.
    fail_on: Mutex<Vec<String>>,
}

impl MockRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any execution call whose payload contains `needle` fail.
    pub fn fail_when_contains(&self, needle: impl Into<String>) {
        self.fail_on.lock().unwrap().push(needle.into());
    }

    /// Queue a one-shot foreground answer.
    pub fn push_foreground(&self, name: impl Into<String>) {
        self.foreground_script
            .lock()
            .unwrap()
            .push_back(Ok(name.into()));
    }

    /// Queue a one-shot foreground lookup failure.
    pub fn push_foreground_error(&self, reason: impl Into<String>) {
        self.foreground_script
            .lock()
            .unwrap()
            .push_back(Err(reason.into()));
    }

    /// Set the sticky foreground answer returned once the script is empty.
    pub fn set_foreground(&self, name: Option<String>) {
        *self.foreground_default.lock().unwrap() = name;
    }

    /// All recorded operations, in call order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.ops.lock().unwrap().iter().map(|(_, op)| op.clone()).collect()
    }

    /// Recorded operations with their call instants, for timing assertions.
    #[must_use]
    pub fn timed_operations(&self) -> Vec<(Instant, Operation)> {
        self.ops.lock().unwrap().clone()
    }

    /// Forget all recorded operations.
    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Assert the exact recorded operation sequence.
    ///
    /// # Panics
    ///
    /// Panics if the recorded operations differ from `expected`.
    pub fn assert_operations(&self, expected: &[Operation]) {
        let actual = self.operations();
        assert_eq!(actual, expected, "recorded operations differ");
    }

    fn record(&self, op: Operation, payload: &str) -> Result<()> {
        self.ops.lock().unwrap().push((Instant::now(), op));
        let fail_on = self.fail_on.lock().unwrap();
        if fail_on.iter().any(|needle| payload.contains(needle.as_str())) {
            return Err(DeckError::Execution(format!(
                "injected failure for '{payload}'"
            )));
        }
        Ok(())
    }
}

impl ActionRunner for MockRunner {
    fn open_url(&self, url: &str) -> Result<()> {
        self.record(
            Operation::OpenUrl {
                url: url.to_string(),
            },
            url,
        )
    }

    fn launch_process(&self, path: &str) -> Result<()> {
        self.record(
            Operation::Launch {
                path: path.to_string(),
            },
            path,
        )
    }

    fn open_with(&self, app: &str, target: &str) -> Result<()> {
        self.record(
            Operation::OpenWith {
                app: app.to_string(),
                target: target.to_string(),
            },
            target,
        )
    }

    fn send_keystroke(&self, keys: &Keystroke) -> Result<()> {
        let combo = keys.to_string();
        self.record(Operation::Keystroke { combo: combo.clone() }, &combo)
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.record(
            Operation::TypeText {
                text: text.to_string(),
            },
            text,
        )
    }

    fn read_foreground_process_name(&self) -> Result<String> {
        self.record(Operation::ReadForeground, "")?;
        if let Some(answer) = self.foreground_script.lock().unwrap().pop_front() {
            return answer.map_err(DeckError::Execution);
        }
        self.foreground_default
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DeckError::Execution("no scripted foreground process".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mock = MockRunner::new();
        mock.open_url("https://a").unwrap();
        mock.type_text("hi").unwrap();
        mock.assert_operations(&[
            Operation::OpenUrl {
                url: "https://a".to_string(),
            },
            Operation::TypeText {
                text: "hi".to_string(),
            },
        ]);
    }

    #[test]
    fn test_failure_injection_still_records() {
        let mock = MockRunner::new();
        mock.fail_when_contains("bad");
        assert!(mock.launch_process("good.exe").is_ok());
        assert!(mock.launch_process("bad.exe").is_err());
        assert_eq!(mock.operations().len(), 2);
    }

    #[test]
    fn test_foreground_script_then_default() {
        let mock = MockRunner::new();
        mock.push_foreground("code.exe");
        mock.push_foreground_error("gone");
        mock.set_foreground(Some("shell.exe".to_string()));

        assert_eq!(mock.read_foreground_process_name().unwrap(), "code.exe");
        assert!(mock.read_foreground_process_name().is_err());
        assert_eq!(mock.read_foreground_process_name().unwrap(), "shell.exe");
        assert_eq!(mock.read_foreground_process_name().unwrap(), "shell.exe");
    }

    #[test]
    fn test_foreground_unscripted_fails() {
        let mock = MockRunner::new();
        assert!(mock.read_foreground_process_name().is_err());
    }
}
