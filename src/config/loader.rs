//! Loading, repairing and atomically saving the configuration document.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::schema::{Document, Settings};
use crate::action::Action;
use crate::error::{DeckError, Result};
use crate::profile::{ButtonId, Gesture, Profile};
use crate::state::EngineState;

/// Load the engine state from `path`.
///
/// A missing file yields the default state (one `"Default"` profile, all
/// bindings `none`). A file that fails to parse is replaced by defaults with
/// a warning; anything structurally salvageable is kept by [`repair`].
pub fn load(path: &Path) -> Result<EngineState> {
    if !path.exists() {
        info!(path = %path.display(), "no configuration file; starting with defaults");
        return Ok(EngineState::default());
    }
    let text = fs::read_to_string(path)?;
    let doc: Document = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed configuration; using defaults");
            Document::default()
        }
    };
    Ok(repair(doc))
}

/// Turn a parsed document into a valid [`EngineState`], substituting
/// defaults for anything missing or malformed. Run once at load.
pub fn repair(doc: Document) -> EngineState {
    let mut profiles: Vec<Profile> = Vec::new();

    for (name, value) in &doc.profiles {
        if name.trim().is_empty() {
            warn!("dropping profile with empty name");
            continue;
        }
        if profiles.iter().any(|p| p.name() == name) {
            warn!(profile = %name, "dropping duplicate profile entry");
            continue;
        }
        profiles.push(repair_profile(name, value));
    }

    if profiles.is_empty() {
        profiles.push(Profile::new(crate::state::DEFAULT_PROFILE));
    }

    let active = if profiles
        .iter()
        .any(|p| p.name() == doc.settings.active_profile)
    {
        doc.settings.active_profile.clone()
    } else {
        let fallback = profiles[0].name().to_string();
        if doc.settings.active_profile != fallback {
            warn!(
                missing = %doc.settings.active_profile,
                fallback = %fallback,
                "active profile not found; falling back"
            );
        }
        fallback
    };

    let mut rules: BTreeMap<String, String> = BTreeMap::new();
    for (exe, target) in &doc.automation {
        if profiles.iter().any(|p| p.name() == target) {
            rules.insert(exe.to_lowercase(), target.clone());
        } else {
            warn!(exe = %exe, target = %target, "dropping automation rule for missing profile");
        }
    }

    EngineState::from_parts(
        doc.settings.arduino_port,
        doc.settings.baud,
        doc.settings.automation_enabled,
        active,
        profiles,
        rules,
    )
}

/// Decode one profile's bindings, degrading broken entries to `none`.
fn repair_profile(name: &str, value: &Value) -> Profile {
    let mut profile = Profile::new(name);
    let Some(obj) = value.as_object() else {
        warn!(profile = %name, "profile entry is not an object; seeding with none bindings");
        return profile;
    };
    for button in ButtonId::all() {
        for gesture in Gesture::all() {
            let key = binding_key(button, gesture);
            match obj.get(&key) {
                None => {}
                Some(raw) => match Action::from_config_value(raw) {
                    Ok(action) => profile.set_action(button, gesture, action),
                    Err(e) => {
                        warn!(profile = %name, key = %key, error = %e, "degrading broken binding to none");
                    }
                },
            }
        }
    }
    profile
}

/// Serialize the state back into the document form.
#[must_use]
pub fn to_document(state: &EngineState) -> Document {
    let mut profiles = Map::new();
    for profile in state.profiles() {
        let mut bindings = Map::new();
        for button in ButtonId::all() {
            for gesture in Gesture::all() {
                bindings.insert(
                    binding_key(button, gesture),
                    profile.action_for(button, gesture).to_config_value(),
                );
            }
        }
        profiles.insert(profile.name().to_string(), Value::Object(bindings));
    }

    Document {
        settings: Settings {
            arduino_port: state.port().to_string(),
            baud: state.baud(),
            active_profile: state.active_name().to_string(),
            automation_enabled: state.automation_enabled(),
        },
        profiles,
        automation: state.rules().clone(),
    }
}

/// Save the state to `path` as an atomic whole-file rewrite: write to a
/// sibling temp file, then rename over the target.
pub fn save(path: &Path, state: &EngineState) -> Result<()> {
    let doc = to_document(state);
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| DeckError::Other(format!("failed to serialize configuration: {e}")))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "configuration saved");
    Ok(())
}

fn binding_key(button: ButtonId, gesture: Gesture) -> String {
    format!("BUTTON_{button}_{gesture}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Step;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = TempDir::new().unwrap();
        let state = load(&dir.path().join("config.json")).unwrap();
        assert_eq!(state.active_name(), "Default");
        assert_eq!(state.profiles().len(), 1);
    }

    #[test]
    fn test_load_garbage_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let state = load(&path).unwrap();
        assert_eq!(state.active_name(), "Default");
    }

    #[test]
    fn test_repair_fills_missing_bindings() {
        let doc: Document = serde_json::from_value(json!({
            "profiles": {
                "Work": {
                    "BUTTON_1_PRESS": {"type": "link", "value": "https://example.com"}
                }
            }
        }))
        .unwrap();
        let state = repair(doc);
        let profile = &state.profiles()[0];
        assert_eq!(
            profile.action_for(ButtonId::new(1).unwrap(), Gesture::Press),
            &Action::Step(Step::Link("https://example.com".to_string()))
        );
        // Everything unspecified is none.
        assert!(profile
            .action_for(ButtonId::new(1).unwrap(), Gesture::Hold)
            .is_none());
        assert!(profile
            .action_for(ButtonId::new(9).unwrap(), Gesture::Press)
            .is_none());
    }

    #[test]
    fn test_repair_degrades_broken_binding() {
        let doc: Document = serde_json::from_value(json!({
            "profiles": {
                "Work": {
                    "BUTTON_2_PRESS": {"type": "delay", "value": "not-a-number"},
                    "BUTTON_3_HOLD": {"type": "keystroke", "value": "ctrl+c"}
                }
            }
        }))
        .unwrap();
        let state = repair(doc);
        let profile = &state.profiles()[0];
        assert!(profile
            .action_for(ButtonId::new(2).unwrap(), Gesture::Press)
            .is_none());
        assert_eq!(
            profile.action_for(ButtonId::new(3).unwrap(), Gesture::Hold),
            &Action::Step(Step::Keystroke("ctrl+c".parse().unwrap()))
        );
    }

    #[test]
    fn test_repair_active_fallback_and_rule_pruning() {
        let doc: Document = serde_json::from_value(json!({
            "settings": {"active_profile": "Gone"},
            "profiles": {"A": {}, "B": {}},
            "automation": {"App.EXE": "B", "ghost.exe": "Gone"}
        }))
        .unwrap();
        let state = repair(doc);
        assert_eq!(state.active_name(), "A");
        assert_eq!(state.rule_target("app.exe"), Some("B"));
        assert_eq!(state.rule_target("ghost.exe"), None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut state = EngineState::default();
        state.create("Coding").unwrap();
        state.create("Media").unwrap();
        state
            .set_binding(
                "Coding",
                ButtonId::new(4).unwrap(),
                Gesture::Press,
                Action::Macro(vec![
                    Step::Keystroke("ctrl+a".parse().unwrap()),
                    Step::Delay(100),
                    Step::Keystroke("ctrl+c".parse().unwrap()),
                ]),
            )
            .unwrap();
        state
            .set_binding(
                "Media",
                ButtonId::new(7).unwrap(),
                Gesture::Hold,
                Action::Step(Step::OpenWith {
                    app: "player".to_string(),
                    target: "show.mkv".to_string(),
                }),
            )
            .unwrap();
        state.set_automation_rule("code.exe", "Coding").unwrap();
        state.set_automation_rule("vlc.exe", "Media").unwrap();
        state.toggle_automation(true);
        state.set_active("Media").unwrap();
        state.set_port("/dev/ttyACM0".to_string());

        save(&path, &state).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.active_name(), state.active_name());
        assert_eq!(loaded.port(), state.port());
        assert_eq!(loaded.baud(), state.baud());
        assert_eq!(loaded.automation_enabled(), state.automation_enabled());
        assert_eq!(loaded.rules(), state.rules());
        assert_eq!(loaded.profiles(), state.profiles());
    }

    #[test]
    fn test_save_is_atomic_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        save(&path, &EngineState::default()).unwrap();
        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.exists());
    }

    #[test]
    fn test_cycle_order_survives_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut state = EngineState::default();
        state.create("Zeta").unwrap();
        state.create("Alpha").unwrap();
        save(&path, &state).unwrap();

        let mut loaded = load(&path).unwrap();
        assert_eq!(loaded.cycle_active(), "Zeta");
        assert_eq!(loaded.cycle_active(), "Alpha");
        assert_eq!(loaded.cycle_active(), "Default");
    }
}
