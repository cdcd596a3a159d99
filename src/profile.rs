//! Profiles: named, complete sets of button-to-action bindings.
//!
//! A profile owns exactly [`BUTTON_COUNT`] bindings, one per physical button,
//! each with an independent press and hold action. Bindings are complete by
//! construction; anything not explicitly configured is the `none` action.

use std::fmt;

use crate::action::Action;

/// Number of physical buttons on the deck.
pub const BUTTON_COUNT: usize = 9;

/// Identifier of a physical button, `1..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(u8);

impl ButtonId {
    /// Create a button id, rejecting values outside `1..=9`.
    #[must_use]
    pub fn new(n: u8) -> Option<Self> {
        (1..=BUTTON_COUNT as u8).contains(&n).then_some(Self(n))
    }

    /// The 1-based hardware number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The 0-based table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// Iterate over every button id in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=BUTTON_COUNT as u8).map(Self)
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a button event is a quick press or a sustained hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Press,
    Hold,
}

impl Gesture {
    /// The wire/configuration segment (`PRESS` / `HOLD`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Press => "PRESS",
            Self::Hold => "HOLD",
        }
    }

    /// Parse the wire/configuration segment.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRESS" => Some(Self::Press),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }

    /// Both gestures, in configuration order.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Press, Self::Hold]
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pair of actions configured for one physical button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonBinding {
    /// Action for a quick tap.
    pub press: Action,
    /// Action for a long press.
    pub hold: Action,
}

impl ButtonBinding {
    /// The action for a gesture.
    #[must_use]
    pub fn action(&self, gesture: Gesture) -> &Action {
        match gesture {
            Gesture::Press => &self.press,
            Gesture::Hold => &self.hold,
        }
    }

    /// Mutable access to the action for a gesture.
    pub fn action_mut(&mut self, gesture: Gesture) -> &mut Action {
        match gesture {
            Gesture::Press => &mut self.press,
            Gesture::Hold => &mut self.hold,
        }
    }
}

/// A named, complete set of button bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    bindings: [ButtonBinding; BUTTON_COUNT],
}

impl Profile {
    /// Create a profile seeded with `none` bindings everywhere.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Default::default(),
        }
    }

    /// The profile name (unique within the store).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// The binding for a button.
    #[must_use]
    pub fn binding(&self, button: ButtonId) -> &ButtonBinding {
        &self.bindings[button.index()]
    }

    /// The action for a button gesture.
    #[must_use]
    pub fn action_for(&self, button: ButtonId, gesture: Gesture) -> &Action {
        self.binding(button).action(gesture)
    }

    /// Replace the action for a button gesture.
    pub fn set_action(&mut self, button: ButtonId, gesture: Gesture, action: Action) {
        *self.bindings[button.index()].action_mut(gesture) = action;
    }
}
