//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ConsoleDeck - serial-button action dispatcher with profile automation.
#[derive(Parser, Debug)]
#[command(name = "cdeck", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output logs as JSON lines (for machine consumption)
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, env = "CDECK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine: serial listener, dispatcher and foreground watcher
    Run(RunArgs),

    /// Manage profiles
    #[command(subcommand)]
    Profile(ProfileCmd),

    /// Bind an action to a button gesture
    Bind(BindArgs),

    /// Show the bindings of a profile
    Bindings(BindingsArgs),

    /// Manage automation rules (foreground app -> profile)
    #[command(subcommand)]
    Rule(RuleCmd),

    /// Enable or disable automatic profile switching
    Automation(AutomationArgs),

    /// Set the serial port
    Port(PortArgs),

    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCmd),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Serial port override for this run (not persisted)
    #[arg(long, short = 'p')]
    pub port: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCmd {
    /// List profiles (active one marked with *)
    List,
    /// Create a new profile with empty bindings
    Create {
        /// Profile name (unique)
        name: String,
    },
    /// Rename a profile, migrating every reference to it
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },
    /// Delete a profile (refused for the last one)
    Delete {
        /// Profile name
        name: String,
    },
    /// Make a profile active
    Activate {
        /// Profile name
        name: String,
    },
    /// Cycle to the next profile
    Cycle,
}

/// Gesture selector for bind operations.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GestureArg {
    Press,
    Hold,
}

#[derive(Parser, Debug)]
pub struct BindArgs {
    /// Button number (1-9)
    pub button: u8,

    /// Gesture to bind
    pub gesture: GestureArg,

    /// Action as JSON, e.g. '{"type":"keystroke","value":"ctrl+c"}'
    pub action: String,

    /// Target profile (defaults to the active one)
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Parser, Debug)]
pub struct BindingsArgs {
    /// Profile to show (defaults to the active one)
    pub profile: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RuleCmd {
    /// List automation rules
    List,
    /// Map a foreground executable name to a profile
    Set {
        /// Executable file name (e.g. "code.exe"); stored lower-cased
        exe: String,
        /// Profile to activate
        profile: String,
    },
    /// Remove the rule for an executable
    Remove {
        /// Executable file name
        exe: String,
    },
}

/// On/off switch argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    #[must_use]
    pub const fn as_bool(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Parser, Debug)]
pub struct AutomationArgs {
    /// Desired state
    pub state: OnOff,
}

#[derive(Parser, Debug)]
pub struct PortArgs {
    /// Port identifier (e.g. "COM4" or "/dev/ttyACM0")
    pub port: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Print the configuration document
    Show,
    /// Print the configuration file path
    Path,
    /// Create a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bind_args() {
        let cli = Cli::parse_from([
            "cdeck",
            "bind",
            "3",
            "hold",
            r#"{"type":"link","value":"https://example.com"}"#,
            "--profile",
            "Work",
        ]);
        match cli.command {
            Commands::Bind(args) => {
                assert_eq!(args.button, 3);
                assert!(matches!(args.gesture, GestureArg::Hold));
                assert_eq!(args.profile.as_deref(), Some("Work"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_on_off() {
        assert!(OnOff::On.as_bool());
        assert!(!OnOff::Off.as_bool());
    }
}
