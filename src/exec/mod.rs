//! Execution capability seam.
//!
//! This module provides a trait-based abstraction over the OS-level
//! primitives the engine calls into (opening URLs, launching processes,
//! synthesizing input, reading the foreground process), enabling
//! testability without touching the desktop.

mod interpreter;
pub mod mock;
mod os;

pub use interpreter::{Interpreter, STEP_SETTLE};
pub use os::OsRunner;

use std::sync::Arc;

use crate::action::Keystroke;
use crate::error::Result;

/// OS execution capabilities the engine depends on.
///
/// Every method failure is an advisory [`crate::error::DeckError::Execution`]:
/// the caller logs it and moves on, it never aborts a macro or the process.
pub trait ActionRunner: Send + Sync {
    /// Open a URL with the default handler.
    fn open_url(&self, url: &str) -> Result<()>;

    /// Launch an executable, detached.
    fn launch_process(&self, path: &str) -> Result<()>;

    /// Open `target` with the application `app`.
    fn open_with(&self, app: &str, target: &str) -> Result<()>;

    /// Send a key combination.
    fn send_keystroke(&self, keys: &Keystroke) -> Result<()>;

    /// Type a literal string.
    fn type_text(&self, text: &str) -> Result<()>;

    /// The executable file name of the process owning the foreground window.
    fn read_foreground_process_name(&self) -> Result<String>;
}

/// Shared handle to a runner, cloneable across the engine's loops.
pub type SharedRunner = Arc<dyn ActionRunner>;
