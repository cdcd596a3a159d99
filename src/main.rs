//! ConsoleDeck binary - serial-button action dispatch with profile automation.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use cdeck::action::Action;
use cdeck::cli::{
    AutomationArgs, BindArgs, BindingsArgs, Cli, Commands, CompletionsArgs, ConfigCmd, GestureArg,
    PortArgs, ProfileCmd, RuleCmd, RunArgs,
};
use cdeck::config;
use cdeck::engine::{normalize_port, Engine};
use cdeck::error::DeckError;
use cdeck::exec::{OsRunner, SharedRunner};
use cdeck::logging::init_logging;
use cdeck::profile::{ButtonId, Gesture};
use cdeck::serial::{PortOpener, SystemPortOpener};
use cdeck::state::{EngineState, SharedState};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json, cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        if let Some(deck_err) = e.downcast_ref::<DeckError>() {
            if let Some(hint) = deck_err.suggestion() {
                eprintln!("Hint: {hint}");
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run(args) => cmd_run(cli, args),
        Commands::Profile(cmd) => cmd_profile(cli, cmd),
        Commands::Bind(args) => cmd_bind(cli, args),
        Commands::Bindings(args) => cmd_bindings(cli, args),
        Commands::Rule(cmd) => cmd_rule(cli, cmd),
        Commands::Automation(args) => cmd_automation(cli, args),
        Commands::Port(args) => cmd_port(cli, args),
        Commands::Config(cmd) => cmd_config(cli, cmd),
        Commands::Completions(args) => cmd_completions(args),
    }
}

fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(config::config_file_path()?),
    }
}

/// Load, mutate under the closure, save, and report.
fn with_saved_state(
    cli: &Cli,
    f: impl FnOnce(&mut EngineState) -> anyhow::Result<String>,
) -> anyhow::Result<()> {
    let path = config_path(cli)?;
    let mut state = config::load(&path)?;
    let message = f(&mut state)?;
    config::save(&path, &state)?;
    if !cli.quiet {
        println!("{message}");
    }
    Ok(())
}

// === Engine run loop ===

fn cmd_run(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let path = config_path(cli)?;
    let mut initial = config::load(&path)?;
    if let Some(port) = &args.port {
        initial.set_port(normalize_port(port));
    }
    let state = SharedState::new(initial);
    let runner: SharedRunner = Arc::new(OsRunner::new());
    let opener: Arc<dyn PortOpener> = Arc::new(SystemPortOpener::default());

    let mut engine = Engine::new(state.clone(), runner, opener);
    engine.start();

    if !cli.quiet {
        println!(
            "ConsoleDeck running on {} (active profile: {})",
            state.port(),
            state.active_name()
        );
        print_control_help();
    }

    // The interaction/control loop: one command per stdin line, until quit
    // or EOF.
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read control input")?;
        if !control_command(&mut engine, &path, line.trim())? {
            break;
        }
        io::stdout().flush().ok();
    }

    engine.shutdown();
    config::save(&path, &engine.state().snapshot())?;
    if !cli.quiet {
        println!("Stopped.");
    }
    Ok(())
}

fn print_control_help() {
    println!("Commands:");
    println!("  status              show port, active profile and automation state");
    println!("  profile <name>      activate a profile");
    println!("  cycle               activate the next profile");
    println!("  automation on|off   toggle automatic profile switching");
    println!("  port <name>         change the serial port and reconnect");
    println!("  quit                stop the engine and exit");
}

/// Handle one control line. Returns false to stop the engine.
fn control_command(engine: &mut Engine, path: &std::path::Path, line: &str) -> anyhow::Result<bool> {
    let state = engine.state().clone();
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match command {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "help" => print_control_help(),
        "status" => {
            println!(
                "port: {}  active: {}  automation: {}",
                state.port(),
                state.active_name(),
                if state.automation_enabled() { "on" } else { "off" }
            );
        }
        "profile" => match state.set_active(rest) {
            Ok(()) => {
                println!("Active profile: {rest}");
                config::save(path, &state.snapshot())?;
            }
            Err(e) => println!("{e}"),
        },
        "cycle" => {
            let name = state.cycle_active();
            println!("Active profile: {name}");
            config::save(path, &state.snapshot())?;
        }
        "automation" => match rest {
            "on" | "off" => {
                state.with(|s| s.toggle_automation(rest == "on"));
                println!("Automation {rest}");
                config::save(path, &state.snapshot())?;
            }
            _ => println!("Usage: automation on|off"),
        },
        "port" => {
            if rest.is_empty() {
                println!("Usage: port <name>");
            } else {
                engine.change_port(rest);
                println!("Port: {}", state.port());
                config::save(path, &state.snapshot())?;
            }
        }
        other => println!("Unknown command '{other}' (try: help)"),
    }
    Ok(true)
}

// === Configuration commands ===

fn cmd_profile(cli: &Cli, cmd: &ProfileCmd) -> anyhow::Result<()> {
    match cmd {
        ProfileCmd::List => {
            let state = config::load(&config_path(cli)?)?;
            for profile in state.profiles() {
                let marker = if profile.name() == state.active_name() {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}", profile.name());
            }
            Ok(())
        }
        ProfileCmd::Create { name } => with_saved_state(cli, |state| {
            state.create(name)?;
            Ok(format!("Created profile '{name}'"))
        }),
        ProfileCmd::Rename { old, new } => with_saved_state(cli, |state| {
            state.rename(old, new)?;
            Ok(format!("Renamed profile '{old}' to '{new}'"))
        }),
        ProfileCmd::Delete { name } => with_saved_state(cli, |state| {
            state.delete(name)?;
            Ok(format!("Deleted profile '{name}'"))
        }),
        ProfileCmd::Activate { name } => with_saved_state(cli, |state| {
            state.set_active(name)?;
            Ok(format!("Active profile: {name}"))
        }),
        ProfileCmd::Cycle => with_saved_state(cli, |state| {
            let name = state.cycle_active();
            Ok(format!("Active profile: {name}"))
        }),
    }
}

fn gesture_of(arg: GestureArg) -> Gesture {
    match arg {
        GestureArg::Press => Gesture::Press,
        GestureArg::Hold => Gesture::Hold,
    }
}

fn cmd_bind(cli: &Cli, args: &BindArgs) -> anyhow::Result<()> {
    let button = ButtonId::new(args.button)
        .ok_or_else(|| DeckError::Validation(format!("button must be 1-9, got {}", args.button)))?;
    let value: serde_json::Value = serde_json::from_str(&args.action)
        .map_err(|e| DeckError::Validation(format!("action is not valid JSON: {e}")))?;
    let action = Action::from_config_value(&value)?;
    action.validate()?;
    let gesture = gesture_of(args.gesture);

    with_saved_state(cli, |state| {
        let profile = args
            .profile
            .clone()
            .unwrap_or_else(|| state.active_name().to_string());
        state.set_binding(&profile, button, gesture, action.clone())?;
        Ok(format!(
            "Bound button {button} {gesture} in '{profile}': {}",
            action.describe()
        ))
    })
}

fn cmd_bindings(cli: &Cli, args: &BindingsArgs) -> anyhow::Result<()> {
    let state = config::load(&config_path(cli)?)?;
    let name = args
        .profile
        .clone()
        .unwrap_or_else(|| state.active_name().to_string());
    let profile = state
        .profiles()
        .iter()
        .find(|p| p.name() == name)
        .ok_or(DeckError::ProfileNotFound { name: name.clone() })?;

    println!("Profile '{name}':");
    for button in ButtonId::all() {
        let binding = profile.binding(button);
        println!(
            "  {button}  press: {:<40}  hold: {}",
            binding.press.describe(),
            binding.hold.describe()
        );
    }
    Ok(())
}

fn cmd_rule(cli: &Cli, cmd: &RuleCmd) -> anyhow::Result<()> {
    match cmd {
        RuleCmd::List => {
            let state = config::load(&config_path(cli)?)?;
            if state.rules().is_empty() {
                println!("No automation rules");
            }
            for (exe, profile) in state.rules() {
                println!("{exe} -> {profile}");
            }
            Ok(())
        }
        RuleCmd::Set { exe, profile } => with_saved_state(cli, |state| {
            state.set_automation_rule(exe, profile)?;
            Ok(format!("Rule: {} -> {profile}", exe.to_lowercase()))
        }),
        RuleCmd::Remove { exe } => with_saved_state(cli, |state| {
            if state.remove_automation_rule(exe) {
                Ok(format!("Removed rule for {}", exe.to_lowercase()))
            } else {
                Err(DeckError::RuleNotFound { exe: exe.clone() }.into())
            }
        }),
    }
}

fn cmd_automation(cli: &Cli, args: &AutomationArgs) -> anyhow::Result<()> {
    with_saved_state(cli, |state| {
        state.toggle_automation(args.state.as_bool());
        Ok(format!(
            "Automation {}",
            if args.state.as_bool() { "on" } else { "off" }
        ))
    })
}

fn cmd_port(cli: &Cli, args: &PortArgs) -> anyhow::Result<()> {
    with_saved_state(cli, |state| {
        let port = normalize_port(&args.port);
        state.set_port(port.clone());
        Ok(format!("Port: {port}"))
    })
}

fn cmd_config(cli: &Cli, cmd: &ConfigCmd) -> anyhow::Result<()> {
    let path = config_path(cli)?;
    match cmd {
        ConfigCmd::Show => {
            let state = config::load(&path)?;
            let doc = config::to_document(&state);
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        ConfigCmd::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCmd::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "configuration already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            config::save(&path, &EngineState::default())?;
            if !cli.quiet {
                println!("Wrote default configuration to {}", path.display());
            }
            Ok(())
        }
    }
}

fn cmd_completions(args: &CompletionsArgs) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(args.shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
