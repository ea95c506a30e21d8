//! Path resolution for edgeward.
//!
//! # Environment Variables
//!
//! - `EDGEWARD_CONFIG_DIR` - Override the directory holding `edgeward.toml`
//! - `EDGEWARD_STATE_DIR` - Override the state directory (state, journal, cache)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `EDGEWARD_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/edgeward` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\edgeward`
//!    - Linux: `~/.config/edgeward`
//!
//! For state_dir():
//! 1. `EDGEWARD_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/edgeward` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\edgeward`
//!    - Linux: `~/.local/state/edgeward`

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const ENV_CONFIG_DIR: &str = "EDGEWARD_CONFIG_DIR";
pub const ENV_STATE_DIR: &str = "EDGEWARD_STATE_DIR";

pub const CONFIG_FILE: &str = "edgeward.toml";
pub const STATE_FILE: &str = "state.json";
pub const JOURNAL_FILE: &str = "journal.jsonl";
pub const CACHE_DIR: &str = "cache";

const APP_DIR: &str = "edgeward";

/// Directory holding `edgeward.toml`.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {ENV_CONFIG_DIR}: {}", path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join(APP_DIR))
}

/// Directory holding state, journal and artifact cache.
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {ENV_STATE_DIR}: {}", path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join(APP_DIR))
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand `~` and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
