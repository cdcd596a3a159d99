//! Structured logging initialization for the ConsoleDeck engine.
//!
//! Human-friendly output on a TTY, compact plain output when piped, JSON
//! lines on request. All diagnostics go to stderr; stdout stays free for the
//! control loop and command output.

use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber based on CLI flags and environment.
///
/// `verbose` levels: 0 = info, 1 = debug, 2+ = trace. `quiet` drops
/// everything below error. `RUST_LOG` overrides the default filter, e.g.
/// `RUST_LOG=cdeck=debug,serialport=warn`.
pub fn init_logging(json: bool, verbose: u8, quiet: bool) {
    let default_directive = if quiet {
        "cdeck=error"
    } else {
        match verbose {
            0 => "cdeck=info",
            1 => "cdeck=debug",
            _ => "cdeck=trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        builder.json().with_target(true).init();
    } else if io::stderr().is_terminal() {
        builder.init();
    } else {
        builder.with_ansi(false).compact().init();
    }
}
