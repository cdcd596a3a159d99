//! Real OS adapter for the execution capabilities.
//!
//! URLs and open-with go through the `open` crate, process launches through
//! `std::process::Command`, input synthesis through `enigo`. Foreground
//! process detection queries the Win32 foreground window on Windows and
//! reports a non-fatal error elsewhere.

use std::process::Command;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::debug;

use super::ActionRunner;
use crate::action::Keystroke;
use crate::error::{DeckError, Result};

/// Production [`ActionRunner`] backed by the host OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRunner;

impl OsRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn exec_err(what: &str, e: impl std::fmt::Display) -> DeckError {
    DeckError::Execution(format!("{what}: {e}"))
}

impl ActionRunner for OsRunner {
    fn open_url(&self, url: &str) -> Result<()> {
        debug!(url = %url, "opening link");
        open::that_detached(url).map_err(|e| exec_err("failed to open link", e))
    }

    fn launch_process(&self, path: &str) -> Result<()> {
        debug!(path = %path, "launching executable");
        Command::new(path)
            .spawn()
            .map(drop)
            .map_err(|e| exec_err("failed to launch executable", e))
    }

    fn open_with(&self, app: &str, target: &str) -> Result<()> {
        debug!(app = %app, target = %target, "opening target with application");
        open::with_detached(target, app).map_err(|e| exec_err("failed to open target", e))
    }

    fn send_keystroke(&self, keys: &Keystroke) -> Result<()> {
        debug!(combo = %keys, "sending keystroke");
        let mut enigo =
            Enigo::new(&Settings::default()).map_err(|e| exec_err("input backend", e))?;

        let mut held: Vec<Key> = Vec::new();
        if keys.ctrl {
            held.push(Key::Control);
        }
        if keys.alt {
            held.push(Key::Alt);
        }
        if keys.shift {
            held.push(Key::Shift);
        }

        let primary = key_for_token(&keys.key)?;
        for key in &held {
            enigo
                .key(*key, Direction::Press)
                .map_err(|e| exec_err("failed to press modifier", e))?;
        }
        let result = enigo
            .key(primary, Direction::Click)
            .map_err(|e| exec_err("failed to press key", e));
        // Always release what was pressed, even if the primary key failed.
        for key in held.iter().rev() {
            let _ = enigo.key(*key, Direction::Release);
        }
        result
    }

    fn type_text(&self, text: &str) -> Result<()> {
        debug!(chars = text.chars().count(), "typing text");
        let mut enigo =
            Enigo::new(&Settings::default()).map_err(|e| exec_err("input backend", e))?;
        enigo
            .text(text)
            .map_err(|e| exec_err("failed to type text", e))
    }

    fn read_foreground_process_name(&self) -> Result<String> {
        foreground_process_name()
    }
}

/// Map a lower-cased key token to an input key.
fn key_for_token(token: &str) -> Result<Key> {
    let key = match token {
        "ctrl" => Key::Control,
        "alt" => Key::Alt,
        "shift" => Key::Shift,
        "win" | "super" | "cmd" | "meta" => Key::Meta,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(DeckError::Execution(format!(
                        "unrecognized key name '{other}'"
                    )))
                }
            }
        }
    };
    Ok(key)
}

/// Executable file name of the foreground window's process, lower-cased by
/// the watcher at the call site.
#[cfg(windows)]
#[allow(unsafe_code)]
fn foreground_process_name() -> Result<String> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use std::path::Path;

    use windows::core::PWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_FORMAT,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    let failed = || DeckError::Execution("failed to resolve foreground process".to_string());

    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.0.is_null() {
            return Err(failed());
        }
        let mut pid = 0u32;
        let _ = GetWindowThreadProcessId(hwnd, Some(&mut pid));
        if pid == 0 {
            return Err(failed());
        }
        let handle =
            OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).map_err(|_| failed())?;
        let mut buffer = vec![0u16; 1024];
        let mut size = buffer.len() as u32;
        let ok = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_FORMAT(0),
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        )
        .is_ok();
        let _ = CloseHandle(handle);
        if !ok || size == 0 {
            return Err(failed());
        }
        let path = OsString::from_wide(&buffer[..size as usize]);
        Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(failed)
    }
}

#[cfg(not(windows))]
fn foreground_process_name() -> Result<String> {
    Err(DeckError::Execution(
        "foreground process detection is not supported on this platform".to_string(),
    ))
}
