//! Step and macro execution.
//!
//! Steps run strictly in order on the calling thread; macro steps are
//! separated by a fixed settle delay. A step failure is logged and the
//! sequence continues, so one broken step never aborts a macro.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::SharedRunner;
use crate::action::{Action, Step};
use crate::error::{DeckError, Result};
use crate::state::SharedState;

/// Settle delay inserted between consecutive macro steps, in addition to any
/// explicit `delay` step.
pub const STEP_SETTLE: Duration = Duration::from_millis(50);

/// Executes actions against the runner capabilities and the shared state.
pub struct Interpreter {
    runner: SharedRunner,
    state: SharedState,
}

impl Interpreter {
    #[must_use]
    pub fn new(runner: SharedRunner, state: SharedState) -> Self {
        Self { runner, state }
    }

    /// Execute an action to completion. Blocking: `delay` steps and the
    /// inter-step settle sleep on the calling thread, which is why dispatch
    /// runs on its own worker and never on the serial-read loop.
    pub fn execute(&self, action: &Action) {
        match action {
            Action::Step(step) => {
                if let Err(e) = self.run_step(step) {
                    warn!(step = %step.describe(), error = %e, "action failed");
                }
            }
            Action::Macro(steps) => self.run_macro(steps),
        }
    }

    /// Run macro steps in order with the settle delay between consecutive
    /// steps. Failures are logged per step; the macro never aborts early.
    fn run_macro(&self, steps: &[Step]) {
        debug!(steps = steps.len(), "running macro");
        for (index, step) in steps.iter().enumerate() {
            if index > 0 {
                thread::sleep(STEP_SETTLE);
            }
            if let Err(e) = self.run_step(step) {
                warn!(
                    step = index,
                    kind = %step.describe(),
                    error = %e,
                    "macro step failed; continuing"
                );
            }
        }
    }

    fn run_step(&self, step: &Step) -> Result<()> {
        match step {
            Step::None => Ok(()),
            Step::Link(url) => self.runner.open_url(url),
            Step::Exe(path) => self.runner.launch_process(path),
            Step::OpenWith { app, target } => {
                // Checked at call time: skip (with a reported error) rather
                // than handing a dead path to the OS.
                if !Path::new(app).exists() {
                    return Err(DeckError::Execution(format!(
                        "application does not exist: {app}"
                    )));
                }
                if !Path::new(target).exists() {
                    return Err(DeckError::Execution(format!(
                        "target does not exist: {target}"
                    )));
                }
                self.runner.open_with(app, target)
            }
            Step::Keystroke(keys) => self.runner.send_keystroke(keys),
            Step::TypeText(text) => self.runner.type_text(text),
            Step::Delay(ms) => {
                thread::sleep(Duration::from_millis(*ms));
                Ok(())
            }
            Step::SwitchProfile => {
                let profile = self.state.cycle_active();
                info!(profile = %profile, "switched profile");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Keystroke;
    use crate::exec::mock::{MockRunner, Operation};
    use std::sync::Arc;
    use std::time::Instant;

    fn harness() -> (Arc<MockRunner>, Interpreter) {
        let runner = Arc::new(MockRunner::new());
        let interp = Interpreter::new(runner.clone(), SharedState::default());
        (runner, interp)
    }

    #[test]
    fn test_single_step_executes() {
        let (runner, interp) = harness();
        interp.execute(&Action::Step(Step::Link("https://example.com".to_string())));
        runner.assert_operations(&[Operation::OpenUrl {
            url: "https://example.com".to_string(),
        }]);
    }

    #[test]
    fn test_none_does_nothing() {
        let (runner, interp) = harness();
        interp.execute(&Action::default());
        runner.assert_operations(&[]);
    }

    #[test]
    fn test_macro_runs_in_order_with_settle() {
        let (runner, interp) = harness();
        let start = Instant::now();
        interp.execute(&Action::Macro(vec![
            Step::Keystroke(Keystroke::plain("a")),
            Step::Keystroke(Keystroke::plain("b")),
            Step::Keystroke(Keystroke::plain("c")),
        ]));
        assert!(start.elapsed() >= STEP_SETTLE * 2);

        let timed = runner.timed_operations();
        let combos: Vec<&Operation> = timed.iter().map(|(_, op)| op).collect();
        assert_eq!(
            combos,
            [
                &Operation::Keystroke {
                    combo: "a".to_string()
                },
                &Operation::Keystroke {
                    combo: "b".to_string()
                },
                &Operation::Keystroke {
                    combo: "c".to_string()
                },
            ]
        );
        // Settle gap between every pair of consecutive steps.
        for pair in timed.windows(2) {
            let gap = pair[1].0.duration_since(pair[0].0);
            assert!(gap >= STEP_SETTLE, "gap was {gap:?}");
        }
    }

    #[test]
    fn test_macro_continues_after_step_failure() {
        let (runner, interp) = harness();
        runner.fail_when_contains("broken");
        interp.execute(&Action::Macro(vec![
            Step::TypeText("first".to_string()),
            Step::Exe("broken.exe".to_string()),
            Step::TypeText("last".to_string()),
        ]));
        // All three steps attempted despite the middle failure.
        assert_eq!(runner.operations().len(), 3);
        assert_eq!(
            runner.operations().last(),
            Some(&Operation::TypeText {
                text: "last".to_string()
            })
        );
    }

    #[test]
    fn test_explicit_delay_blocks() {
        let (_runner, interp) = harness();
        let start = Instant::now();
        interp.execute(&Action::Step(Step::Delay(60)));
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_open_with_missing_paths_skipped() {
        let (runner, interp) = harness();
        interp.execute(&Action::Step(Step::OpenWith {
            app: "/definitely/not/here".to_string(),
            target: "/also/missing".to_string(),
        }));
        // Skipped before reaching the runner.
        runner.assert_operations(&[]);
    }

    #[test]
    fn test_open_with_existing_paths_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = dir.path().join("app");
        let target = dir.path().join("doc.txt");
        std::fs::write(&app, "").unwrap();
        std::fs::write(&target, "").unwrap();

        let (runner, interp) = harness();
        interp.execute(&Action::Step(Step::OpenWith {
            app: app.display().to_string(),
            target: target.display().to_string(),
        }));
        assert_eq!(runner.operations().len(), 1);
    }

    #[test]
    fn test_switch_profile_step_cycles_store() {
        let runner = Arc::new(MockRunner::new());
        let state = SharedState::new({
            let mut s = crate::state::EngineState::default();
            s.create("Second").unwrap();
            s
        });
        let interp = Interpreter::new(runner, state.clone());

        interp.execute(&Action::Step(Step::SwitchProfile));
        assert_eq!(state.active_name(), "Second");
        interp.execute(&Action::Step(Step::SwitchProfile));
        assert_eq!(state.active_name(), "Default");
    }
}
