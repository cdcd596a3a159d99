//! Shared engine state and profile store operations.
//!
//! [`EngineState`] is the single piece of mutable state shared by the serial
//! loop, the foreground watcher and the control loop. All of it lives behind
//! one mutex ([`SharedState`]); every multi-field read and every multi-step
//! mutation is one lock acquisition, so a concurrent reader never observes a
//! half-applied rename or delete.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::action::Action;
use crate::debounce::DebounceGate;
use crate::error::{DeckError, Result};
use crate::profile::{ButtonId, Gesture, Profile};

/// Default serial port identifier (the original deployment's).
pub const DEFAULT_PORT: &str = "COM4";

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 9600;

/// Name of the profile created on first run.
pub const DEFAULT_PROFILE: &str = "Default";

/// Process-wide engine state: settings, profile table, automation rules and
/// the debounce ledger.
#[derive(Debug, Clone)]
pub struct EngineState {
    port: String,
    baud: u32,
    automation_enabled: bool,
    active: String,
    /// Insertion-ordered; names are unique. Cycling follows this order.
    profiles: Vec<Profile>,
    /// Lower-cased executable file name -> profile name.
    rules: BTreeMap<String, String>,
    gate: DebounceGate,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::from_parts(
            DEFAULT_PORT.to_string(),
            DEFAULT_BAUD,
            false,
            DEFAULT_PROFILE.to_string(),
            vec![Profile::new(DEFAULT_PROFILE)],
            BTreeMap::new(),
        )
    }
}

impl EngineState {
    /// Assemble a state from already-repaired parts. The caller guarantees at
    /// least one profile and an `active` name that exists in `profiles`.
    #[must_use]
    pub fn from_parts(
        port: String,
        baud: u32,
        automation_enabled: bool,
        active: String,
        profiles: Vec<Profile>,
        rules: BTreeMap<String, String>,
    ) -> Self {
        debug_assert!(!profiles.is_empty());
        debug_assert!(profiles.iter().any(|p| p.name() == active));
        Self {
            port,
            baud,
            automation_enabled,
            active,
            profiles,
            rules,
            gate: DebounceGate::new(),
        }
    }

    // --- Settings ---

    /// The configured serial port identifier.
    #[must_use]
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn set_port(&mut self, port: String) {
        self.port = port;
    }

    /// The configured serial baud rate.
    #[must_use]
    pub const fn baud(&self) -> u32 {
        self.baud
    }

    /// Whether automatic profile switching is enabled.
    #[must_use]
    pub const fn automation_enabled(&self) -> bool {
        self.automation_enabled
    }

    pub fn toggle_automation(&mut self, enabled: bool) {
        self.automation_enabled = enabled;
    }

    // --- Profile store ---

    /// The name of the active profile.
    #[must_use]
    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// A copy of the active profile.
    #[must_use]
    pub fn get_active(&self) -> Profile {
        self.profiles
            .iter()
            .find(|p| p.name() == self.active)
            .cloned()
            .unwrap_or_else(|| Profile::new(&*self.active))
    }

    /// All profiles in insertion (cycling) order.
    #[must_use]
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Automation rules (`exe name -> profile name`).
    #[must_use]
    pub const fn rules(&self) -> &BTreeMap<String, String> {
        &self.rules
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name() == name)
    }

    /// Make `name` the active profile.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if self.position(name).is_none() {
            return Err(DeckError::ProfileNotFound {
                name: name.to_string(),
            });
        }
        self.active = name.to_string();
        Ok(())
    }

    /// Advance the active profile to the next one in insertion order,
    /// wrapping at the end. Returns the new active name.
    pub fn cycle_active(&mut self) -> String {
        let next = self
            .position(&self.active)
            .map_or(0, |i| (i + 1) % self.profiles.len());
        self.active = self.profiles[next].name().to_string();
        self.active.clone()
    }

    /// Create a new profile seeded with `none` bindings.
    pub fn create(&mut self, name: &str) -> Result<()> {
        validate_profile_name(name)?;
        if self.position(name).is_some() {
            return Err(DeckError::ProfileExists {
                name: name.to_string(),
            });
        }
        self.profiles.push(Profile::new(name));
        Ok(())
    }

    /// Rename a profile, migrating the active pointer and every automation
    /// rule that referenced the old name. Atomic: on error nothing changes.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        validate_profile_name(new)?;
        let index = self.position(old).ok_or_else(|| DeckError::ProfileNotFound {
            name: old.to_string(),
        })?;
        if old != new && self.position(new).is_some() {
            return Err(DeckError::ProfileExists {
                name: new.to_string(),
            });
        }

        self.profiles[index].set_name(new.to_string());
        if self.active == old {
            self.active = new.to_string();
        }
        for target in self.rules.values_mut() {
            if target == old {
                *target = new.to_string();
            }
        }
        Ok(())
    }

    /// Delete a profile. Refused for the last remaining profile. Automation
    /// rules pointing at it are removed; if it was active, the first
    /// remaining profile becomes active.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let index = self.position(name).ok_or_else(|| DeckError::ProfileNotFound {
            name: name.to_string(),
        })?;
        if self.profiles.len() == 1 {
            return Err(DeckError::LastProfile);
        }

        self.profiles.remove(index);
        self.rules.retain(|_, target| target != name);
        if self.active == name {
            self.active = self.profiles[0].name().to_string();
        }
        Ok(())
    }

    /// Replace the action bound to a button gesture in the named profile.
    pub fn set_binding(
        &mut self,
        profile: &str,
        button: ButtonId,
        gesture: Gesture,
        action: Action,
    ) -> Result<()> {
        let index = self
            .position(profile)
            .ok_or_else(|| DeckError::ProfileNotFound {
                name: profile.to_string(),
            })?;
        self.profiles[index].set_action(button, gesture, action);
        Ok(())
    }

    // --- Automation rules ---

    /// Map an executable name to a profile. The executable is stored
    /// lower-cased; an executable maps to at most one profile.
    pub fn set_automation_rule(&mut self, exe: &str, profile: &str) -> Result<()> {
        if self.position(profile).is_none() {
            return Err(DeckError::ProfileNotFound {
                name: profile.to_string(),
            });
        }
        self.rules
            .insert(exe.to_lowercase(), profile.to_string());
        Ok(())
    }

    /// Remove the rule for an executable. Returns whether a rule existed.
    pub fn remove_automation_rule(&mut self, exe: &str) -> bool {
        self.rules.remove(&exe.to_lowercase()).is_some()
    }

    /// The profile a lower-cased executable name maps to, if any.
    #[must_use]
    pub fn rule_target(&self, exe: &str) -> Option<&str> {
        self.rules.get(exe).map(String::as_str)
    }

    // --- Dispatch-side reads ---

    /// The action currently bound to a button gesture in the active profile.
    #[must_use]
    pub fn binding_for(&self, button: ButtonId, gesture: Gesture) -> Action {
        self.profiles
            .iter()
            .find(|p| p.name() == self.active)
            .map(|p| p.action_for(button, gesture).clone())
            .unwrap_or_default()
    }
}

/// Cheaply cloneable handle to the engine state; the single synchronization
/// boundary shared by all loops.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<EngineState>>);

impl Default for SharedState {
    fn default() -> Self {
        Self::new(EngineState::default())
    }
}

impl SharedState {
    #[must_use]
    pub fn new(state: EngineState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.0.lock().expect("engine state lock poisoned")
    }

    /// A point-in-time copy of the whole state, e.g. for persistence.
    #[must_use]
    pub fn snapshot(&self) -> EngineState {
        self.lock().clone()
    }

    /// Run a closure under the state lock.
    ///
    /// This is the hook for multi-step control operations (mutate, then read
    /// what to persist) that must appear atomic to the other loops.
    pub fn with<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        f(&mut self.lock())
    }

    #[must_use]
    pub fn port(&self) -> String {
        self.lock().port().to_string()
    }

    #[must_use]
    pub fn baud(&self) -> u32 {
        self.lock().baud()
    }

    #[must_use]
    pub fn automation_enabled(&self) -> bool {
        self.lock().automation_enabled()
    }

    #[must_use]
    pub fn active_name(&self) -> String {
        self.lock().active_name().to_string()
    }

    pub fn set_active(&self, name: &str) -> Result<()> {
        self.lock().set_active(name)
    }

    /// Cycle to the next profile; returns the new active name.
    pub fn cycle_active(&self) -> String {
        let name = self.lock().cycle_active();
        info!(profile = %name, "active profile cycled");
        name
    }

    /// Gate an incoming hardware event through the per-button cooldown.
    pub fn admit(&self, button: ButtonId, now: Instant) -> bool {
        let mut state = self.lock();
        state.gate.admit(button, now)
    }

    /// Resolve the binding for an event against the profile that is active
    /// *now* (last-writer-wins; no replay against a stale profile).
    #[must_use]
    pub fn binding_for(&self, button: ButtonId, gesture: Gesture) -> Action {
        self.lock().binding_for(button, gesture)
    }

    /// One watcher iteration's rule application, atomic with respect to the
    /// flag, the rule table and the active pointer. Returns the profile
    /// switched to, if a switch happened.
    pub fn apply_automation(&self, exe: &str) -> Option<String> {
        let mut state = self.lock();
        if !state.automation_enabled() {
            return None;
        }
        let target = state.rule_target(exe)?.to_string();
        if target == state.active_name() {
            return None;
        }
        match state.set_active(&target) {
            Ok(()) => {
                debug!(exe = %exe, profile = %target, "automation switched profile");
                Some(target)
            }
            Err(e) => {
                warn!(exe = %exe, error = %e, "automation rule points at a missing profile");
                None
            }
        }
    }
}

fn validate_profile_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DeckError::InvalidProfileName {
            reason: "name must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Step;
    use std::time::Duration;

    fn state_with(names: &[&str]) -> EngineState {
        let profiles: Vec<Profile> = names.iter().map(|n| Profile::new(*n)).collect();
        EngineState::from_parts(
            DEFAULT_PORT.to_string(),
            DEFAULT_BAUD,
            false,
            names[0].to_string(),
            profiles,
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_default_state() {
        let state = EngineState::default();
        assert_eq!(state.active_name(), DEFAULT_PROFILE);
        assert_eq!(state.profiles().len(), 1);
        assert_eq!(state.port(), DEFAULT_PORT);
        assert!(!state.automation_enabled());
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let mut state = state_with(&["Default"]);
        state.create("Work").unwrap();
        assert!(matches!(
            state.create("Work"),
            Err(DeckError::ProfileExists { .. })
        ));
        assert_eq!(state.profiles().len(), 2);
    }

    #[test]
    fn test_create_empty_name_rejected() {
        let mut state = state_with(&["Default"]);
        assert!(state.create("  ").is_err());
    }

    #[test]
    fn test_set_active_unknown_rejected() {
        let mut state = state_with(&["Default"]);
        assert!(matches!(
            state.set_active("Nope"),
            Err(DeckError::ProfileNotFound { .. })
        ));
        assert_eq!(state.active_name(), "Default");
    }

    #[test]
    fn test_cycle_wraps_in_insertion_order() {
        let mut state = state_with(&["A", "B", "C"]);
        state.set_active("C").unwrap();
        assert_eq!(state.cycle_active(), "A");
        assert_eq!(state.cycle_active(), "B");
        assert_eq!(state.cycle_active(), "C");
    }

    #[test]
    fn test_cycle_single_profile_is_stable() {
        let mut state = state_with(&["Only"]);
        assert_eq!(state.cycle_active(), "Only");
    }

    #[test]
    fn test_rename_migrates_active_and_rules() {
        let mut state = state_with(&["Work", "Play"]);
        state.set_automation_rule("code.exe", "Work").unwrap();
        state.set_automation_rule("term.exe", "Work").unwrap();
        state.set_automation_rule("game.exe", "Play").unwrap();

        state.rename("Work", "Office").unwrap();

        assert_eq!(state.active_name(), "Office");
        assert_eq!(state.rule_target("code.exe"), Some("Office"));
        assert_eq!(state.rule_target("term.exe"), Some("Office"));
        assert_eq!(state.rule_target("game.exe"), Some("Play"));
        assert!(state.position("Work").is_none());
    }

    #[test]
    fn test_rename_conflict_changes_nothing() {
        let mut state = state_with(&["Work", "Play"]);
        state.set_automation_rule("code.exe", "Work").unwrap();

        assert!(matches!(
            state.rename("Work", "Play"),
            Err(DeckError::ProfileExists { .. })
        ));
        assert_eq!(state.active_name(), "Work");
        assert_eq!(state.rule_target("code.exe"), Some("Work"));
    }

    #[test]
    fn test_rename_to_same_name_is_ok() {
        let mut state = state_with(&["Work"]);
        state.rename("Work", "Work").unwrap();
        assert_eq!(state.active_name(), "Work");
    }

    #[test]
    fn test_delete_last_profile_refused() {
        let mut state = state_with(&["Default"]);
        let before = state.get_active();
        assert!(matches!(state.delete("Default"), Err(DeckError::LastProfile)));
        assert_eq!(state.profiles().len(), 1);
        assert_eq!(state.get_active(), before);
    }

    #[test]
    fn test_delete_prunes_rules_and_falls_back_active() {
        let mut state = state_with(&["A", "B"]);
        state.set_active("B").unwrap();
        state.set_automation_rule("x.exe", "B").unwrap();
        state.set_automation_rule("y.exe", "A").unwrap();

        state.delete("B").unwrap();

        assert_eq!(state.active_name(), "A");
        assert_eq!(state.rule_target("x.exe"), None);
        assert_eq!(state.rule_target("y.exe"), Some("A"));
    }

    #[test]
    fn test_rule_requires_existing_target() {
        let mut state = state_with(&["Default"]);
        assert!(matches!(
            state.set_automation_rule("app.exe", "Nope"),
            Err(DeckError::ProfileNotFound { .. })
        ));
        assert!(state.rules().is_empty());
    }

    #[test]
    fn test_rule_exe_lowercased_and_replaced() {
        let mut state = state_with(&["A", "B"]);
        state.set_automation_rule("Code.EXE", "A").unwrap();
        assert_eq!(state.rule_target("code.exe"), Some("A"));

        state.set_automation_rule("code.exe", "B").unwrap();
        assert_eq!(state.rule_target("code.exe"), Some("B"));
        assert_eq!(state.rules().len(), 1);

        assert!(state.remove_automation_rule("CODE.exe"));
        assert!(!state.remove_automation_rule("code.exe"));
    }

    #[test]
    fn test_binding_for_reads_active_profile() {
        let mut state = state_with(&["A", "B"]);
        let b1 = ButtonId::new(1).unwrap();
        state
            .set_binding("A", b1, Gesture::Press, Action::Step(Step::Delay(1)))
            .unwrap();
        state
            .set_binding("B", b1, Gesture::Press, Action::Step(Step::Delay(2)))
            .unwrap();

        assert_eq!(
            state.binding_for(b1, Gesture::Press),
            Action::Step(Step::Delay(1))
        );
        state.set_active("B").unwrap();
        assert_eq!(
            state.binding_for(b1, Gesture::Press),
            Action::Step(Step::Delay(2))
        );
    }

    #[test]
    fn test_shared_apply_automation() {
        let shared = SharedState::new({
            let mut s = state_with(&["Default", "Coding"]);
            s.set_automation_rule("code.exe", "Coding").unwrap();
            s.toggle_automation(true);
            s
        });

        // No rule for this exe.
        assert_eq!(shared.apply_automation("browser.exe"), None);
        // Rule hit, target differs from active.
        assert_eq!(
            shared.apply_automation("code.exe"),
            Some("Coding".to_string())
        );
        assert_eq!(shared.active_name(), "Coding");
        // Already active: no switch.
        assert_eq!(shared.apply_automation("code.exe"), None);
    }

    #[test]
    fn test_shared_apply_automation_respects_flag() {
        let shared = SharedState::new({
            let mut s = state_with(&["Default", "Coding"]);
            s.set_automation_rule("code.exe", "Coding").unwrap();
            s
        });
        assert_eq!(shared.apply_automation("code.exe"), None);
        assert_eq!(shared.active_name(), "Default");
    }

    #[test]
    fn test_shared_admit_gates_per_button() {
        let shared = SharedState::default();
        let b = ButtonId::new(2).unwrap();
        let t0 = Instant::now();
        assert!(shared.admit(b, t0));
        assert!(!shared.admit(b, t0 + Duration::from_millis(200)));
        assert!(shared.admit(b, t0 + Duration::from_millis(700)));
    }
}
