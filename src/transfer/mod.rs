//! Export and import documents.
//!
//! Two shapes exist. A bulk export carries the whole settings document; a
//! scope export carries one conversation's or persona's snapshot. Both are
//! tagged with the extension name and rejected when the tag does not match.
//! Parsing validates everything up front so a failed import never mutates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::mask::SelectionMask;
use crate::settings::ExtensionSettings;
use crate::snapshot::Snapshot;
use crate::storage::{CentralThemes, Scope, ScopeKind};

pub const EXTENSION_NAME: &str = "ThemePresetManager";
pub const EXPORT_VERSION: &str = "1.0.0";

pub type TransferResult<T> = std::result::Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to parse export file")]
    Parse(#[from] serde_json::Error),
    #[error("export file belongs to another extension: {found:?}")]
    ForeignExtension { found: Option<String> },
    #[error("export file has no settings section")]
    MissingSettings,
    #[error("export file has no scope type or theme data")]
    MissingThemeData,
    #[error("theme data is not an object")]
    MalformedThemeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing data and layer the file on top.
    Merge,
    /// Discard existing data; the file plus defaults wins.
    Replace,
}

/// Settings section of a bulk export. Absent fields mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSettings {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub auto_apply: Option<bool>,
    #[serde(default)]
    pub use_default_settings_only: Option<bool>,
    #[serde(default)]
    pub default_selected_settings: Option<SelectionMask>,
    #[serde(default)]
    pub chat_themes: Option<BTreeMap<String, Snapshot>>,
    #[serde(default)]
    pub character_themes: Option<BTreeMap<String, Snapshot>>,
    #[serde(default)]
    pub auto_save_slot: Option<Snapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsExport {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: i64,
    pub extension_name: String,
    pub settings: ExportedSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScopeTarget {
    #[serde(rename = "chat", rename_all = "camelCase")]
    Conversation {
        chat_id: String,
        #[serde(default)]
        chat_name: Option<String>,
    },
    #[serde(rename = "character", rename_all = "camelCase")]
    Persona {
        character_id: String,
        #[serde(default)]
        character_name: Option<String>,
    },
}

impl ScopeTarget {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Conversation { .. } => ScopeKind::Conversation,
            Self::Persona { .. } => ScopeKind::Persona,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Conversation { chat_id, .. } => chat_id,
            Self::Persona { character_id, .. } => character_id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Conversation { chat_name, .. } => chat_name.as_deref(),
            Self::Persona { character_name, .. } => character_name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeExport {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: i64,
    pub extension_name: String,
    #[serde(flatten)]
    pub target: ScopeTarget,
    /// Kept raw so a merge import only overrides the fields the file provides.
    pub theme_data: Map<String, Value>,
}

impl ScopeExport {
    pub fn kind(&self) -> ScopeKind {
        self.target.kind()
    }

    pub fn snapshot(&self) -> TransferResult<Snapshot> {
        Ok(serde_json::from_value(Value::Object(self.theme_data.clone()))?)
    }

    /// The snapshot to store for this import given what the target scope holds now.
    pub fn resolve(&self, current: Option<&Snapshot>, mode: ImportMode) -> TransferResult<Snapshot> {
        let Some(current) = current.filter(|_| mode == ImportMode::Merge) else {
            return self.snapshot();
        };
        let Value::Object(mut merged) = serde_json::to_value(current)? else {
            return Err(TransferError::MalformedThemeData);
        };
        merged.extend(self.theme_data.clone());
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

/// Either export shape, for callers that do not know which one they hold.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportFile {
    Settings(SettingsExport),
    Scope(ScopeExport),
}

impl fmt::Display for ExportFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings(export) => {
                let settings = &export.settings;
                writeln!(f, "bulk export v{} ({} ms)", export.version, export.timestamp)?;
                writeln!(
                    f,
                    "  conversations: {}",
                    settings.chat_themes.as_ref().map_or(0, BTreeMap::len)
                )?;
                writeln!(
                    f,
                    "  personas: {}",
                    settings.character_themes.as_ref().map_or(0, BTreeMap::len)
                )?;
                write!(
                    f,
                    "  auto-slot: {}",
                    if settings.auto_save_slot.is_some() { "present" } else { "empty" }
                )
            }
            Self::Scope(export) => {
                writeln!(
                    f,
                    "{} export v{} ({} ms)",
                    export.kind().label(),
                    export.version,
                    export.timestamp
                )?;
                writeln!(
                    f,
                    "  id: {}{}",
                    export.target.id(),
                    export.target.name().map(|name| format!(" ({name})")).unwrap_or_default()
                )?;
                let theme = export
                    .theme_data
                    .get("theme")
                    .and_then(|theme| theme.get("theme"))
                    .and_then(Value::as_str)
                    .unwrap_or("-");
                write!(f, "  theme: {theme}")
            }
        }
    }
}

pub fn export_settings(settings: &ExtensionSettings, timestamp: i64) -> SettingsExport {
    SettingsExport {
        version: EXPORT_VERSION.to_string(),
        timestamp,
        extension_name: EXTENSION_NAME.to_string(),
        settings: ExportedSettings {
            enabled: Some(settings.enabled),
            auto_apply: Some(settings.auto_apply),
            use_default_settings_only: Some(settings.use_default_settings_only),
            default_selected_settings: Some(settings.default_selected_settings.clone()),
            chat_themes: Some(settings.themes.chat_themes.clone()),
            character_themes: Some(settings.themes.character_themes.clone()),
            auto_save_slot: settings.auto_save_slot.restore(),
        },
    }
}

pub fn export_scope(
    scope: &Scope,
    name: Option<String>,
    snapshot: &Snapshot,
    timestamp: i64,
) -> TransferResult<ScopeExport> {
    let Value::Object(theme_data) = serde_json::to_value(snapshot)? else {
        return Err(TransferError::MalformedThemeData);
    };
    let target = match scope.kind {
        ScopeKind::Conversation => ScopeTarget::Conversation {
            chat_id: scope.id.clone(),
            chat_name: name,
        },
        ScopeKind::Persona => ScopeTarget::Persona {
            character_id: scope.id.clone(),
            character_name: name,
        },
    };
    Ok(ScopeExport {
        version: EXPORT_VERSION.to_string(),
        timestamp,
        extension_name: EXTENSION_NAME.to_string(),
        target,
        theme_data,
    })
}

pub fn parse_settings_export(json: &str) -> TransferResult<SettingsExport> {
    let raw = tagged_document(json)?;
    if raw.get("settings").map_or(true, Value::is_null) {
        return Err(TransferError::MissingSettings);
    }
    Ok(serde_json::from_value(raw)?)
}

pub fn parse_scope_export(json: &str) -> TransferResult<ScopeExport> {
    let raw = tagged_document(json)?;
    let has_type = raw.get("type").is_some_and(|t| !t.is_null());
    let has_theme_data = raw.get("themeData").is_some_and(|t| !t.is_null());
    if !has_type || !has_theme_data {
        return Err(TransferError::MissingThemeData);
    }
    if !raw["themeData"].is_object() {
        return Err(TransferError::MalformedThemeData);
    }
    let export: ScopeExport = serde_json::from_value(raw)?;
    export.snapshot()?;
    Ok(export)
}

pub fn parse_export(json: &str) -> TransferResult<ExportFile> {
    let raw = tagged_document(json)?;
    if raw.get("settings").is_some() {
        return parse_settings_export(json).map(ExportFile::Settings);
    }
    parse_scope_export(json).map(ExportFile::Scope)
}

/// Fold an imported settings section into `current`.
pub fn apply_settings_import(current: &mut ExtensionSettings, imported: ExportedSettings, mode: ImportMode) {
    let base = match mode {
        ImportMode::Merge => current.clone(),
        ImportMode::Replace => ExtensionSettings::default(),
    };

    let mut themes = base.themes;
    themes.merge_from(CentralThemes {
        chat_themes: imported.chat_themes.unwrap_or_default(),
        character_themes: imported.character_themes.unwrap_or_default(),
    });

    let mut auto_save_slot = base.auto_save_slot;
    if let Some(snapshot) = imported.auto_save_slot {
        auto_save_slot.save(snapshot);
    }

    *current = ExtensionSettings {
        enabled: imported.enabled.unwrap_or(base.enabled),
        auto_apply: imported.auto_apply.unwrap_or(base.auto_apply),
        use_default_settings_only: imported
            .use_default_settings_only
            .unwrap_or(base.use_default_settings_only),
        default_selected_settings: imported
            .default_selected_settings
            .unwrap_or(base.default_selected_settings),
        themes,
        auto_save_slot,
    }
    .normalized();
}

fn tagged_document(json: &str) -> TransferResult<Value> {
    let raw: Value = serde_json::from_str(json)?;
    let found = raw.get("extensionName").and_then(Value::as_str);
    if found != Some(EXTENSION_NAME) {
        return Err(TransferError::ForeignExtension {
            found: found.map(str::to_string),
        });
    }
    Ok(raw)
}
