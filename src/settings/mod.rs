use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{app_config_path, config_env_dirs, ConfigPathError, APP_DIR};
use crate::mask::SelectionMask;
use crate::storage::{AutoSlot, CentralThemes};

const SETTINGS_FILE: &str = "settings.json";

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("failed to read settings: {path}")]
    ReadConfig { path: PathBuf, source: io::Error },
    #[error("failed to write settings: {path}")]
    WriteConfig { path: PathBuf, source: io::Error },
    #[error("failed to parse settings")]
    ParseConfig(#[from] serde_json::Error),
}

/// The extension's persisted settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionSettings {
    pub enabled: bool,
    pub auto_apply: bool,
    pub use_default_settings_only: bool,
    pub default_selected_settings: SelectionMask,
    #[serde(flatten)]
    pub themes: CentralThemes,
    pub auto_save_slot: AutoSlot,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_apply: false,
            use_default_settings_only: true,
            default_selected_settings: SelectionMask::builtin(),
            themes: CentralThemes::default(),
            auto_save_slot: AutoSlot::default(),
        }
    }
}

impl ExtensionSettings {
    /// Re-seed an empty default mask from the built-in constant.
    pub fn normalize(&mut self) {
        if self.default_selected_settings.is_empty() {
            tracing::debug!("default selection mask empty; seeding built-in mask");
            self.default_selected_settings = SelectionMask::builtin();
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// Where the settings document lives between sessions.
pub trait SettingsPersistence {
    /// `None` when nothing has been persisted yet.
    fn load(&self) -> SettingsResult<Option<ExtensionSettings>>;
    fn persist(&mut self, settings: &ExtensionSettings) -> SettingsResult<()>;
}

/// Load persisted settings, falling back to defaults when absent or unreadable.
pub fn load_or_default<P: SettingsPersistence + ?Sized>(persistence: &P) -> ExtensionSettings {
    match persistence.load() {
        Ok(Some(settings)) => settings.normalized(),
        Ok(None) => ExtensionSettings::default(),
        Err(err) => {
            tracing::warn!(%err, "failed to load extension settings; using defaults");
            ExtensionSettings::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn from_env() -> SettingsResult<Self> {
        let (xdg_config_home, home) = config_env_dirs();
        Self::with_dirs(xdg_config_home.as_deref(), home.as_deref())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn with_dirs(xdg_config_home: Option<&Path>, home: Option<&Path>) -> SettingsResult<Self> {
        settings_path_with(xdg_config_home, home).map(Self::at)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsPersistence for JsonSettingsFile {
    fn load(&self) -> SettingsResult<Option<ExtensionSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let serialized = fs::read_to_string(&self.path).map_err(|source| SettingsError::ReadConfig {
            path: self.path.clone(),
            source,
        })?;
        let settings: ExtensionSettings = serde_json::from_str(&serialized)?;
        Ok(Some(settings))
    }

    fn persist(&mut self, settings: &ExtensionSettings) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::WriteConfig {
                path: self.path.clone(),
                source,
            })?;
        }
        let serialized = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, serialized).map_err(|source| SettingsError::WriteConfig {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = ?self.path, "persisted extension settings");
        Ok(())
    }
}

fn settings_path_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> SettingsResult<PathBuf> {
    app_config_path(APP_DIR, SETTINGS_FILE, xdg_config_home, home).map_err(|error| match error {
        ConfigPathError::MissingHomeDirectory => SettingsError::MissingHomeDirectory,
    })
}

/// In-memory persistence that counts writes.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    stored: Option<ExtensionSettings>,
    writes: usize,
    fail_writes: bool,
}

impl MemorySettings {
    pub fn with_stored(settings: ExtensionSettings) -> Self {
        Self {
            stored: Some(settings),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Option<&ExtensionSettings> {
        self.stored.as_ref()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }
}

impl SettingsPersistence for MemorySettings {
    fn load(&self) -> SettingsResult<Option<ExtensionSettings>> {
        Ok(self.stored.clone())
    }

    fn persist(&mut self, settings: &ExtensionSettings) -> SettingsResult<()> {
        if self.fail_writes {
            return Err(SettingsError::WriteConfig {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::Other, "writes disabled"),
            });
        }
        self.writes += 1;
        self.stored = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use serde_json::json;

    fn fixture_root() -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let pid = std::process::id();
        path.push(format!("themesync-settings-{pid}-{nanos}"));
        path
    }

    fn with_temp_root<F: FnOnce(&Path)>(f: F) {
        let root = fixture_root();
        fs::create_dir_all(&root).unwrap();
        f(&root);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn defaults_match_first_run_document() {
        let settings = ExtensionSettings::default();
        assert!(settings.enabled);
        assert!(!settings.auto_apply);
        assert!(settings.use_default_settings_only);
        assert_eq!(settings.default_selected_settings, SelectionMask::builtin());
        assert!(settings.auto_save_slot.is_empty());
    }

    #[test]
    fn document_uses_camel_case_keys_with_flattened_theme_maps() {
        let value = serde_json::to_value(ExtensionSettings::default()).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "enabled",
            "autoApply",
            "useDefaultSettingsOnly",
            "defaultSelectedSettings",
            "chatThemes",
            "characterThemes",
            "autoSaveSlot",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object["autoSaveSlot"], json!(null));
    }

    #[test]
    fn partial_document_fills_missing_fields_and_reseeds_empty_mask() {
        let settings: ExtensionSettings = serde_json::from_value(json!({
            "autoApply": true,
            "defaultSelectedSettings": {},
            "chatThemes": { "c1": { "theme": { "theme": "Dark" }, "timestamp": 3 } }
        }))
        .unwrap();
        let settings = settings.normalized();

        assert!(settings.enabled);
        assert!(settings.auto_apply);
        assert_eq!(settings.default_selected_settings, SelectionMask::builtin());
        assert_eq!(
            settings.themes.chat_themes.get("c1").and_then(Snapshot::theme_name),
            Some("Dark")
        );
    }

    #[test]
    fn settings_file_missing_loads_none() {
        with_temp_root(|root| {
            let file = JsonSettingsFile::with_dirs(Some(root), None).unwrap();
            assert!(file.load().unwrap().is_none());
            assert_eq!(load_or_default(&file), ExtensionSettings::default());
        });
    }

    #[test]
    fn settings_file_round_trips() {
        with_temp_root(|root| {
            let mut file = JsonSettingsFile::with_dirs(Some(root), None).unwrap();
            let mut settings = ExtensionSettings {
                auto_apply: true,
                ..ExtensionSettings::default()
            };
            settings.default_selected_settings.set("swipes", false);
            settings.auto_save_slot.save(Snapshot {
                timestamp: 9,
                ..Snapshot::default()
            });

            file.persist(&settings).unwrap();
            assert!(file.path().ends_with("themesync/settings.json"));
            assert_eq!(file.load().unwrap(), Some(settings));
        });
    }

    #[test]
    fn settings_file_rejects_invalid_payload() {
        with_temp_root(|root| {
            let file = JsonSettingsFile::with_dirs(Some(root), None).unwrap();
            fs::create_dir_all(file.path().parent().unwrap()).unwrap();
            fs::write(file.path(), "{ invalid ").unwrap();

            assert!(matches!(file.load(), Err(SettingsError::ParseConfig(_))));
            assert_eq!(load_or_default(&file), ExtensionSettings::default());
        });
    }

    #[test]
    fn settings_path_requires_home_without_xdg() {
        assert!(matches!(
            JsonSettingsFile::with_dirs(None, None),
            Err(SettingsError::MissingHomeDirectory)
        ));
    }

    #[test]
    fn memory_settings_counts_writes_and_can_fail() {
        let mut memory = MemorySettings::default();
        memory.persist(&ExtensionSettings::default()).unwrap();
        assert_eq!(memory.writes(), 1);

        memory.fail_writes();
        assert!(memory.persist(&ExtensionSettings::default()).is_err());
        assert_eq!(memory.writes(), 1);
    }
}
