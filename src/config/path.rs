//! Location of the configuration file.

use std::path::PathBuf;

use crate::error::{DeckError, Result};

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "CDECK_CONFIG";

/// Resolve the configuration file path.
///
/// `CDECK_CONFIG` wins when set; otherwise the platform config directory is
/// used (`~/.config/consoledeck/config.json` on Linux).
pub fn config_file_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir().ok_or_else(|| {
        DeckError::Other("could not determine the user configuration directory".to_string())
    })?;
    Ok(base.join("consoledeck").join("config.json"))
}
