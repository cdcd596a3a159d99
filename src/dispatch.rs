//! Dispatch worker: turns gated hardware events into action executions.
//!
//! Runs on its own thread so macro sleeps never block the serial reader.
//! The binding is resolved against whichever profile is active at lookup
//! time; if the active profile changed between gate admission and lookup,
//! the newer profile wins and the event is never replayed against a stale
//! one.

use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::exec::{Interpreter, SharedRunner};
use crate::serial::ButtonEvent;
use crate::state::SharedState;

/// Capacity of the event queue between the serial reader and the worker.
/// Events arriving while a long macro runs queue up to this bound; overflow
/// is dropped with a warning.
pub const QUEUE_CAPACITY: usize = 32;

/// Create the bounded event channel shared by the serial source(s) and the
/// dispatcher.
#[must_use]
pub fn event_channel() -> (SyncSender<ButtonEvent>, Receiver<ButtonEvent>) {
    std::sync::mpsc::sync_channel(QUEUE_CAPACITY)
}

/// Handle to the dispatch worker thread.
pub struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the worker. It exits when every sender side of `events` is
    /// dropped.
    #[must_use]
    pub fn spawn(events: Receiver<ButtonEvent>, state: SharedState, runner: SharedRunner) -> Self {
        let handle = thread::Builder::new()
            .name("cdeck-dispatch".to_string())
            .spawn(move || run(&events, &state, &runner))
            .expect("failed to spawn dispatch thread");
        Self { handle }
    }

    /// Wait up to `timeout` for the worker to drain and exit. Returns false
    /// if it had to be detached instead (e.g. mid-macro).
    pub fn join(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("dispatch thread did not finish in time; detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = self.handle.join();
        true
    }
}

fn run(events: &Receiver<ButtonEvent>, state: &SharedState, runner: &SharedRunner) {
    let interpreter = Interpreter::new(runner.clone(), state.clone());
    while let Ok(event) = events.recv() {
        // Lookup happens now, not at admission: last writer wins.
        let action = state.binding_for(event.button, event.gesture);
        if action.is_none() {
            debug!(event = %event, "no action bound");
            continue;
        }
        debug!(event = %event, action = %action.describe(), "dispatching");
        interpreter.execute(&action);
    }
    debug!("dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Step};
    use crate::exec::mock::{MockRunner, Operation};
    use crate::profile::{ButtonId, Gesture};
    use crate::state::EngineState;
    use std::sync::Arc;

    fn event(n: u8, gesture: Gesture) -> ButtonEvent {
        ButtonEvent {
            button: ButtonId::new(n).unwrap(),
            gesture,
        }
    }

    #[test]
    fn test_dispatch_resolves_profile_at_lookup_time() {
        let state = SharedState::new({
            let mut s = EngineState::default();
            s.create("Other").unwrap();
            s.set_binding(
                "Default",
                ButtonId::new(1).unwrap(),
                Gesture::Press,
                Action::Step(Step::TypeText("from-default".to_string())),
            )
            .unwrap();
            s.set_binding(
                "Other",
                ButtonId::new(1).unwrap(),
                Gesture::Press,
                Action::Step(Step::TypeText("from-other".to_string())),
            )
            .unwrap();
            s
        });
        let runner = Arc::new(MockRunner::new());
        let (tx, rx) = event_channel();
        let dispatcher = Dispatcher::spawn(rx, state.clone(), runner.clone());

        tx.send(event(1, Gesture::Press)).unwrap();
        // Wait for the first dispatch, then switch the active profile.
        let deadline = Instant::now() + Duration::from_secs(2);
        while runner.operations().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        state.set_active("Other").unwrap();
        tx.send(event(1, Gesture::Press)).unwrap();

        drop(tx);
        assert!(dispatcher.join(Duration::from_secs(2)));
        runner.assert_operations(&[
            Operation::TypeText {
                text: "from-default".to_string(),
            },
            Operation::TypeText {
                text: "from-other".to_string(),
            },
        ]);
    }

    #[test]
    fn test_press_and_hold_select_distinct_actions() {
        let state = SharedState::new({
            let mut s = EngineState::default();
            s.set_binding(
                "Default",
                ButtonId::new(4).unwrap(),
                Gesture::Press,
                Action::Step(Step::TypeText("press".to_string())),
            )
            .unwrap();
            s.set_binding(
                "Default",
                ButtonId::new(4).unwrap(),
                Gesture::Hold,
                Action::Step(Step::TypeText("hold".to_string())),
            )
            .unwrap();
            s
        });
        let runner = Arc::new(MockRunner::new());
        let (tx, rx) = event_channel();
        let dispatcher = Dispatcher::spawn(rx, state, runner.clone());

        tx.send(event(4, Gesture::Hold)).unwrap();
        tx.send(event(4, Gesture::Press)).unwrap();
        drop(tx);
        assert!(dispatcher.join(Duration::from_secs(2)));

        runner.assert_operations(&[
            Operation::TypeText {
                text: "hold".to_string(),
            },
            Operation::TypeText {
                text: "press".to_string(),
            },
        ]);
    }

    #[test]
    fn test_unbound_event_is_noop() {
        let runner = Arc::new(MockRunner::new());
        let (tx, rx) = event_channel();
        let dispatcher = Dispatcher::spawn(rx, SharedState::default(), runner.clone());

        tx.send(event(9, Gesture::Press)).unwrap();
        drop(tx);
        assert!(dispatcher.join(Duration::from_secs(2)));
        runner.assert_operations(&[]);
    }
}
