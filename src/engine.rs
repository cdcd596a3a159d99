//! Engine wiring: owns the shared state and the three background workers.
//!
//! The engine starts the dispatch worker, the serial event source and the
//! foreground watcher, and provides the control operations the interaction
//! loop needs: stop everything, and swap the serial port (which fully stops
//! the previous reader before starting a new one so two readers never share
//! the port).

use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatch::{event_channel, Dispatcher};
use crate::exec::SharedRunner;
use crate::serial::{ButtonEvent, LinkTuning, PortOpener, SerialSource};
use crate::state::SharedState;
use crate::watcher::{ForegroundWatcher, WatcherTuning};

/// Bound on every stop/join when tearing down or restarting a worker.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

/// Running engine instance.
pub struct Engine {
    state: SharedState,
    runner: SharedRunner,
    opener: Arc<dyn PortOpener>,
    link_tuning: LinkTuning,
    watcher_tuning: WatcherTuning,
    events_tx: Option<SyncSender<ButtonEvent>>,
    serial: Option<SerialSource>,
    watcher: Option<ForegroundWatcher>,
    dispatcher: Option<Dispatcher>,
}

impl Engine {
    /// Create a stopped engine around the given state and capabilities.
    #[must_use]
    pub fn new(state: SharedState, runner: SharedRunner, opener: Arc<dyn PortOpener>) -> Self {
        Self {
            state,
            runner,
            opener,
            link_tuning: LinkTuning::default(),
            watcher_tuning: WatcherTuning::default(),
            events_tx: None,
            serial: None,
            watcher: None,
            dispatcher: None,
        }
    }

    /// Override the loop timings (primarily for tests).
    #[must_use]
    pub fn with_tuning(mut self, link: LinkTuning, watcher: WatcherTuning) -> Self {
        self.link_tuning = link;
        self.watcher_tuning = watcher;
        self
    }

    /// The shared state handle.
    #[must_use]
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Start the dispatcher, serial source and foreground watcher. No-op if
    /// already running.
    pub fn start(&mut self) {
        if self.dispatcher.is_some() {
            warn!("engine already running");
            return;
        }
        let (tx, rx) = event_channel();
        self.dispatcher = Some(Dispatcher::spawn(
            rx,
            self.state.clone(),
            self.runner.clone(),
        ));
        self.events_tx = Some(tx);
        self.spawn_serial();
        self.watcher = Some(ForegroundWatcher::spawn(
            self.runner.clone(),
            self.state.clone(),
            self.watcher_tuning.clone(),
        ));
        info!(port = %self.state.port(), "engine started");
    }

    /// Atomically swap the port identifier and restart the serial source.
    /// The old reader is fully stopped (bounded wait) before the new one
    /// starts.
    pub fn change_port(&mut self, port: &str) {
        let port = normalize_port(port);
        if let Some(serial) = self.serial.take() {
            debug!("stopping serial source for port change");
            serial.stop(SHUTDOWN_WAIT);
        }
        self.state.with(|s| s.set_port(port.clone()));
        if self.events_tx.is_some() {
            self.spawn_serial();
        }
        info!(port = %port, "serial port changed");
    }

    /// Stop all workers with bounded waits. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(serial) = self.serial.take() {
            serial.stop(SHUTDOWN_WAIT);
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.stop(SHUTDOWN_WAIT);
        }
        // Closing the channel lets the dispatcher drain and exit.
        self.events_tx = None;
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.join(SHUTDOWN_WAIT);
        }
        debug!("engine stopped");
    }

    fn spawn_serial(&mut self) {
        let events = self
            .events_tx
            .as_ref()
            .expect("event channel must exist before the serial source")
            .clone();
        let (port, baud) = self.state.with(|s| (s.port().to_string(), s.baud()));
        self.serial = Some(SerialSource::spawn(
            self.opener.clone(),
            port,
            baud,
            self.link_tuning.clone(),
            self.state.clone(),
            events,
        ));
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// COM port identifiers are conventionally upper-cased (the original stored
/// them that way); Unix device paths are case-sensitive and left alone.
#[must_use]
pub fn normalize_port(port: &str) -> String {
    let trimmed = port.trim();
    let com_prefixed = trimmed.len() >= 4
        && trimmed
            .get(..3)
            .is_some_and(|p| p.eq_ignore_ascii_case("com"));
    if com_prefixed {
        trimmed.to_uppercase()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::MockRunner;
    use crate::serial::mock::{Chunk, ScriptedOpener};
    use crate::state::EngineState;
    use std::time::Instant;

    fn fast_link() -> LinkTuning {
        LinkTuning {
            read_timeout: Duration::from_millis(20),
            reconnect_backoff: Duration::from_millis(30),
            backoff_slice: Duration::from_millis(5),
        }
    }

    fn fast_watcher() -> WatcherTuning {
        WatcherTuning {
            period: Duration::from_millis(50),
            jitter: Duration::ZERO,
            stop_slice: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_normalize_port() {
        assert_eq!(normalize_port("com7"), "COM7");
        assert_eq!(normalize_port(" COM12 "), "COM12");
        assert_eq!(normalize_port("/dev/ttyACM0"), "/dev/ttyACM0");
        assert_eq!(normalize_port("COM"), "COM");
    }

    #[test]
    fn test_start_and_shutdown_are_bounded() {
        let runner = Arc::new(MockRunner::new());
        let opener = Arc::new(ScriptedOpener::new());
        let mut engine = Engine::new(SharedState::default(), runner, opener)
            .with_tuning(fast_link(), fast_watcher());

        engine.start();
        std::thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        engine.shutdown();
        assert!(start.elapsed() < SHUTDOWN_WAIT);
        // Second shutdown is a no-op.
        engine.shutdown();
    }

    #[test]
    fn test_change_port_restarts_serial() {
        let runner = Arc::new(MockRunner::new());
        let opener = Arc::new(ScriptedOpener::new());
        // Keep the first link alive on timeouts until the port change stops it.
        opener.push_stream(vec![Chunk::Timeout; 200]);
        opener.push_stream(vec![Chunk::Timeout, Chunk::Eof]);

        let state = SharedState::new(EngineState::default());
        let mut engine = Engine::new(state.clone(), runner, opener.clone())
            .with_tuning(fast_link(), fast_watcher());

        engine.start();
        let deadline = Instant::now() + Duration::from_secs(2);
        while opener.open_count() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        engine.change_port("com9");
        assert_eq!(state.port(), "COM9");
        let deadline = Instant::now() + Duration::from_secs(2);
        while opener.open_count() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(opener.open_count() >= 2);

        engine.shutdown();
    }

    #[test]
    fn test_change_port_before_start_only_updates_state() {
        let runner = Arc::new(MockRunner::new());
        let opener = Arc::new(ScriptedOpener::new());
        let state = SharedState::default();
        let mut engine =
            Engine::new(state.clone(), runner, opener.clone()).with_tuning(fast_link(), fast_watcher());

        engine.change_port("com3");
        assert_eq!(state.port(), "COM3");
        assert_eq!(opener.open_count(), 0);
    }
}
