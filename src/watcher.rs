//! Foreground-application watcher.
//!
//! A polling loop that samples the foreground process's executable name and
//! asks the store to apply the matching automation rule. Polling is
//! deliberate: there is no portable push notification for foreground
//! changes. The period and jitter are explicit tuning, not hidden constants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::exec::SharedRunner;
use crate::state::SharedState;

/// Timing knobs for the watcher loop.
#[derive(Debug, Clone)]
pub struct WatcherTuning {
    /// Base sampling period.
    pub period: Duration,
    /// Maximum extra delay added per cycle to avoid phase-locking with other
    /// pollers. Zero disables jitter.
    pub jitter: Duration,
    /// Stop-flag poll interval while sleeping.
    pub stop_slice: Duration,
}

impl Default for WatcherTuning {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(2),
            jitter: Duration::from_millis(250),
            stop_slice: Duration::from_millis(100),
        }
    }
}

/// Handle to the watcher thread.
pub struct ForegroundWatcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ForegroundWatcher {
    /// Spawn the polling loop.
    #[must_use]
    pub fn spawn(runner: SharedRunner, state: SharedState, tuning: WatcherTuning) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("cdeck-watcher".to_string())
            .spawn(move || run(&runner, &state, &tuning, &thread_stop))
            .expect("failed to spawn watcher thread");
        Self { stop, handle }
    }

    /// Request a cooperative stop and wait up to `timeout`. Returns false if
    /// the thread had to be detached instead.
    pub fn stop(self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("watcher thread did not stop in time; detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = self.handle.join();
        true
    }
}

fn run(runner: &SharedRunner, state: &SharedState, tuning: &WatcherTuning, stop: &AtomicBool) {
    let mut last_seen: Option<String> = None;
    let mut jitter = JitterSource::new();

    loop {
        let wait = tuning.period + jitter.next_upto(tuning.jitter);
        if !sleep_with_stop(stop, wait, tuning.stop_slice) {
            break;
        }

        // Checked every iteration, so toggling takes effect within a period.
        if !state.automation_enabled() {
            last_seen = None;
            continue;
        }

        match runner.read_foreground_process_name() {
            Ok(name) => {
                let name = name.to_lowercase();
                if last_seen.as_deref() == Some(name.as_str()) {
                    continue;
                }
                trace!(exe = %name, "foreground changed");
                last_seen = Some(name.clone());
                if let Some(profile) = state.apply_automation(&name) {
                    info!(exe = %name, profile = %profile, "automation activated profile");
                }
            }
            Err(e) => {
                // Process exited mid-lookup or access denied: non-fatal,
                // forget the last sample so the next hit re-evaluates.
                debug!(error = %e, "foreground lookup failed");
                last_seen = None;
            }
        }
    }
    debug!("foreground watcher stopped");
}

/// Small xorshift stream for sleep jitter; quality is irrelevant here.
struct JitterSource(u64);

impl JitterSource {
    fn new() -> Self {
        Self(0x9e37_79b9_7f4a_7c15)
    }

    fn next_upto(&mut self, max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        Duration::from_millis(self.0 % (max_ms + 1))
    }
}

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
