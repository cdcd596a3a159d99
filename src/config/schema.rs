//! Data types for the persisted configuration document.
//!
//! The document mirrors the original flat JSON layout:
//!
//! ```json
//! {
//!   "settings": {
//!     "arduino_port": "COM4",
//!     "baud": 9600,
//!     "active_profile": "Default",
//!     "automation_enabled": false
//!   },
//!   "profiles": {
//!     "Default": {
//!       "BUTTON_1_PRESS": {"type": "link", "value": "https://example.com"},
//!       "BUTTON_1_HOLD": {"type": "none", "value": ""}
//!     }
//!   },
//!   "automation": {
//!     "code.exe": "Coding"
//!   }
//! }
//! ```
//!
//! Binding values stay as raw JSON here; decoding (with repair) happens in
//! [`loader`](super::loader) so one broken binding degrades to `none` instead
//! of failing the whole load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::{DEFAULT_BAUD, DEFAULT_PORT, DEFAULT_PROFILE};

/// Top-level persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub settings: Settings,
    /// Profile name -> binding-key -> action value. Keeps file order so the
    /// cycling order survives a round-trip.
    #[serde(default)]
    pub profiles: Map<String, Value>,
    /// Lower-cased executable name -> profile name.
    #[serde(default)]
    pub automation: BTreeMap<String, String>,
}

/// The `settings` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_port")]
    pub arduino_port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_active")]
    pub active_profile: String,
    #[serde(default)]
    pub automation_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            arduino_port: default_port(),
            baud: default_baud(),
            active_profile: default_active(),
            automation_enabled: false,
        }
    }
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

const fn default_baud() -> u32 {
    DEFAULT_BAUD
}

fn default_active() -> String {
    DEFAULT_PROFILE.to_string()
}
