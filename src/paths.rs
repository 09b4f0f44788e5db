//! Centralized path resolution for plugsync
//!
//! # Environment Variables
//!
//! - `PLUGSYNC_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/plugsync`)
//! - `CLAUDE_CONFIG_DIR` - Override the host program's data directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `PLUGSYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/plugsync` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\plugsync`
//!    - macOS/Linux: `~/.config/plugsync`
//!
//! For host_dir():
//! 1. `CLAUDE_CONFIG_DIR` environment variable
//! 2. `~/.claude`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "PLUGSYNC_CONFIG_DIR";

/// Environment variable the host program reads for its own data directory
pub const ENV_HOST_DIR: &str = "CLAUDE_CONFIG_DIR";

/// Get the plugsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("plugsync");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("plugsync");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("plugsync");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Directory where the host program keeps plugins and settings
pub fn host_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_HOST_DIR) {
        let path = expand(&dir);
        log::debug!("Using host dir from {}: {}", ENV_HOST_DIR, path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".claude"))
}

/// The host's top-level settings file holding user MCP servers
///
/// Lives next to the home directory by default, inside the host dir when
/// that is overridden.
pub fn host_settings_file() -> Result<PathBuf> {
    if std::env::var_os(ENV_HOST_DIR).is_some() {
        return Ok(host_dir()?.join(".claude.json"));
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".claude.json"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
