//! XDG Base Directory paths for trellis.
//!
//! Applications and their plugins get per-application home directories
//! under the data directory; configuration lives under the config directory.

use std::path::{Path, PathBuf};

/// Get the trellis config directory.
///
/// Returns `$XDG_CONFIG_HOME/trellis` if set, otherwise `~/.config/trellis`.
/// This is where the user-level `config.toml` is read from.
///
/// # Examples
///
/// ```
/// use trellis_paths::config_dir;
///
/// let config = config_dir();
/// let user_config = config.join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("trellis")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/trellis")
    } else {
        PathBuf::from(".config/trellis")
    }
}

/// Get the trellis data directory.
///
/// Returns `$XDG_DATA_HOME/trellis` if set, otherwise `~/.local/share/trellis`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("trellis")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/trellis")
    } else {
        PathBuf::from(".local/share/trellis")
    }
}

/// Default home directory for an application: `data_dir()/<application id>`.
pub fn application_home(application_id: &str) -> PathBuf {
    data_dir().join(application_id)
}

/// Home directory of one plugin inside an application home.
///
/// Each plugin gets `<application home>/plugins/<plugin id>`.
pub fn plugin_home(application_home: &Path, plugin_id: &str) -> PathBuf {
    application_home.join("plugins").join(plugin_id)
}
