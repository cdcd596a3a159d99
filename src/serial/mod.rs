//! Reconnecting serial event source.
//!
//! The source owns a background thread driving the link state machine:
//! `Disconnected -> Connecting -> Connected -> (error) -> Disconnected`,
//! with a fixed backoff between attempts and no retry cap (the hardware may
//! be reattached at any time). While connected it reads newline-terminated
//! events, gates them through the per-button cooldown and hands admitted
//! events to the dispatcher channel.
//!
//! The port itself sits behind [`PortOpener`] so the state machine is
//! testable with scripted streams.

pub mod mock;
mod protocol;

pub use protocol::ButtonEvent;

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serialport::SerialPort as _;
use tracing::{debug, info, trace, warn};

use crate::state::SharedState;

/// Opens the hardware link. Implementations clear any input backlog before
/// returning so stale events from before the connection are not replayed.
pub trait PortOpener: Send + Sync {
    fn open(&self, port: &str, baud: u32) -> io::Result<Box<dyn Read + Send>>;
}

/// [`PortOpener`] backed by a real serial port.
pub struct SystemPortOpener {
    read_timeout: Duration,
}

impl SystemPortOpener {
    #[must_use]
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for SystemPortOpener {
    fn default() -> Self {
        Self::new(LinkTuning::default().read_timeout)
    }
}

impl PortOpener for SystemPortOpener {
    fn open(&self, port: &str, baud: u32) -> io::Result<Box<dyn Read + Send>> {
        let port = serialport::new(port, baud)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(port))
    }
}

/// Timing knobs for the link loop.
#[derive(Debug, Clone)]
pub struct LinkTuning {
    /// Per-read timeout; also bounds stop latency while connected.
    pub read_timeout: Duration,
    /// Wait between reconnect attempts.
    pub reconnect_backoff: Duration,
    /// Stop-flag poll interval while backing off.
    pub backoff_slice: Duration,
}

impl Default for LinkTuning {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(5),
            backoff_slice: Duration::from_millis(100),
        }
    }
}

/// Longest run of bytes without a newline kept while assembling lines.
const MAX_PENDING_LINE: usize = 1024;

/// Handle to the serial reader thread.
pub struct SerialSource {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SerialSource {
    /// Spawn the reader for `port`.
    #[must_use]
    pub fn spawn(
        opener: Arc<dyn PortOpener>,
        port: String,
        baud: u32,
        tuning: LinkTuning,
        state: SharedState,
        events: SyncSender<ButtonEvent>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("cdeck-serial".to_string())
            .spawn(move || run(&opener, &port, baud, &tuning, &state, &events, &thread_stop))
            .expect("failed to spawn serial thread");
        Self { stop, handle }
    }

    /// Request a cooperative stop and wait up to `timeout` for the thread to
    /// finish. Returns false if the thread had to be detached instead.
    pub fn stop(self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("serial thread did not stop in time; detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = self.handle.join();
        true
    }
}

fn run(
    opener: &Arc<dyn PortOpener>,
    port: &str,
    baud: u32,
    tuning: &LinkTuning,
    state: &SharedState,
    events: &SyncSender<ButtonEvent>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Relaxed) {
        match opener.open(port, baud) {
            Ok(stream) => {
                info!(port = %port, "serial link connected");
                if read_lines(stream, state, events, stop) == ReadOutcome::Stopped {
                    break;
                }
                warn!(
                    port = %port,
                    backoff = ?tuning.reconnect_backoff,
                    "serial link lost; reconnecting after backoff"
                );
            }
            Err(e) => {
                debug!(port = %port, error = %e, "serial open failed; retrying after backoff");
            }
        }
        if !sleep_with_stop(stop, tuning.reconnect_backoff, tuning.backoff_slice) {
            break;
        }
    }
    debug!("serial source stopped");
}

#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// Stop was requested.
    Stopped,
    /// The link errored or hit EOF; reconnect.
    LinkLost,
}

fn read_lines(
    mut stream: Box<dyn Read + Send>,
    state: &SharedState,
    events: &SyncSender<ButtonEvent>,
    stop: &AtomicBool,
) -> ReadOutcome {
    let mut buf = [0u8; 256];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        if stop.load(Ordering::Relaxed) {
            return ReadOutcome::Stopped;
        }
        match stream.read(&mut buf) {
            Ok(0) => return ReadOutcome::LinkLost,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    handle_line(&line, state, events);
                }
                if pending.len() > MAX_PENDING_LINE {
                    warn!(bytes = pending.len(), "discarding oversized partial line");
                    pending.clear();
                }
            }
            // Timeouts bound the stop-check latency while idle.
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                debug!(error = %e, "serial read error");
                return ReadOutcome::LinkLost;
            }
        }
    }
}

/// Decode, gate and forward one raw line. Invalid UTF-8 and malformed lines
/// are logged and skipped without touching the connection.
fn handle_line(raw: &[u8], state: &SharedState, events: &SyncSender<ButtonEvent>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    trace!(line = %line, "received");

    let Some(event) = ButtonEvent::parse(line) else {
        warn!(line = %line, "malformed event line; ignoring");
        return;
    };
    if !state.admit(event.button, Instant::now()) {
        debug!(button = %event.button, "event debounced");
        return;
    }
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(event = %event, "dispatch queue full; dropping event");
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("dispatch queue closed; dropping event");
        }
    }
}

/// Sleep for `total` in `slice` increments, aborting early when `stop` is
/// set. Returns false if stopped.
fn sleep_with_stop(stop: &AtomicBool, total: Duration, slice: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(slice.min(deadline - now));
    }
}
