//! Error types for ConsoleDeck operations.
//!
//! Nothing in this taxonomy is fatal to the process: the worst outcome is a
//! skipped action or a disconnected link that keeps retrying.

use thiserror::Error;

/// Primary error type for engine operations.
#[derive(Error, Debug)]
pub enum DeckError {
    // Configuration-time errors
    #[error("Invalid action definition: {0}")]
    Validation(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    // Execution-time errors (logged, never abort a macro)
    #[error("Action execution failed: {0}")]
    Execution(String),

    // Serial link errors (trigger reconnect backoff)
    #[error("Serial link error on '{port}': {reason}")]
    Link { port: String, reason: String },

    // Lookup errors (operation is a no-op, state unchanged)
    #[error("Profile not found: {name}")]
    ProfileNotFound { name: String },

    #[error("Profile already exists: {name}")]
    ProfileExists { name: String },

    #[error("No automation rule for executable: {exe}")]
    RuleNotFound { exe: String },

    // State invariant errors (refused, state unchanged)
    #[error("Cannot delete the last remaining profile")]
    LastProfile,

    #[error("Invalid profile name: {reason}")]
    InvalidProfileName { reason: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DeckError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::ProfileNotFound { .. }
                | Self::ProfileExists { .. }
                | Self::RuleNotFound { .. }
                | Self::LastProfile
                | Self::InvalidProfileName { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ProfileNotFound { .. } => Some("Run: cdeck profile list"),
            Self::ProfileExists { .. } => Some("Pick a different profile name"),
            Self::LastProfile => Some("Create another profile before deleting this one"),
            Self::Validation(_) => Some("Run: cdeck bind --help for the action format"),
            Self::Link { .. } => Some("Check the port name with: cdeck config show"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using DeckError.
pub type Result<T> = std::result::Result<T, DeckError>;
