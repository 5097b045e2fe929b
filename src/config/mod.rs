use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

pub const APP_DIR: &str = "themesync";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_RESTORE_DEBOUNCE_MS: u64 = 100;

/// Engine tuning from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Allow the last-resort substring match when resolving field ids.
    pub substring_fallback: bool,
    pub restore_debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            substring_fallback: false,
            restore_debounce_ms: DEFAULT_RESTORE_DEBOUNCE_MS,
        }
    }
}

impl AppConfig {
    pub fn restore_debounce(&self) -> Duration {
        Duration::from_millis(self.restore_debounce_ms)
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let Ok(path) = app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) else {
        tracing::debug!("no config directory; using engine defaults");
        return AppConfig::default();
    };
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return AppConfig::default(),
        Err(err) => {
            tracing::warn!(?err, ?path, "unreadable engine config; using defaults");
            return AppConfig::default();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|err| {
        tracing::warn!(?err, ?path, "invalid engine config; using defaults");
        AppConfig::default()
    })
}

pub fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
