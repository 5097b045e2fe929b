use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod apply;
pub mod builder;

pub use apply::{ApplyReport, SnapshotApplier};
pub use builder::{CaptureOrigin, SnapshotBuilder};

pub const THEME_KEY: &str = "theme";
pub const CUSTOM_CSS_KEY: &str = "customCSS";
pub const BACKGROUND_KEY: &str = "background";

/// Keys captured through dedicated accessors ahead of generic resolution.
pub const HARDCODED_THEME_KEYS: [&str; 3] = [THEME_KEY, CUSTOM_CSS_KEY, BACKGROUND_KEY];

const BACKGROUNDS_DIR: &str = "backgrounds/";
/// Fitting used when a stored background carries no style.
const FALLBACK_BACKGROUND_STYLE: &str = "cover";

/// Captured theme and preference values. `theme` and `settings` never share a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub theme: BTreeMap<String, Value>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub saved_with_advanced_settings: bool,
    #[serde(default)]
    pub saved_with_default_settings: bool,
}

impl Snapshot {
    pub fn field_count(&self) -> usize {
        self.theme.len() + self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    pub fn theme_name(&self) -> Option<&str> {
        self.theme.get(THEME_KEY).and_then(Value::as_str)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.theme.get(key).or_else(|| self.settings.get(key))
    }

    pub fn background(&self) -> Option<Background> {
        let raw = self.theme.get(BACKGROUND_KEY)?;
        match serde_json::from_value(raw.clone()) {
            Ok(background) => Some(background),
            Err(err) => {
                tracing::warn!(?err, "ignoring malformed background entry");
                None
            }
        }
    }
}

/// Current background image as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub is_chat_specific: bool,
    /// Only an explicit `true` pins the background to the chat.
    #[serde(default)]
    pub is_locked: bool,
}

impl Background {
    pub fn new(path: impl Into<String>, style: impl Into<String>, is_locked: bool) -> Self {
        Self {
            path: path.into(),
            style: style.into(),
            is_chat_specific: is_locked,
            is_locked,
        }
    }

    /// Repaired path plus a fitting; `None` when there is no usable path.
    pub fn normalized(&self) -> Option<Background> {
        let path = normalize_background_path(&self.path)?;
        let style = if self.style.is_empty() {
            FALLBACK_BACKGROUND_STYLE.to_string()
        } else {
            self.style.clone()
        };
        Some(Background {
            path,
            style,
            ..self.clone()
        })
    }
}

pub fn normalize_background_path(path: &str) -> Option<String> {
    if path.trim().is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));

    let mut normalized = String::with_capacity(decoded.len() + BACKGROUNDS_DIR.len());
    for ch in decoded.chars() {
        if ch == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(ch);
    }

    const DOUBLED_DIR: &str = "backgrounds/backgrounds/";
    if normalized.starts_with(DOUBLED_DIR) {
        normalized.replace_range(..DOUBLED_DIR.len(), BACKGROUNDS_DIR);
    }
    if !normalized.starts_with(BACKGROUNDS_DIR) {
        normalized.insert_str(0, BACKGROUNDS_DIR);
    }
    if let Some(stem) = normalized.strip_suffix(".jpg.jpg") {
        normalized = format!("{stem}.jpg");
    }
    Some(normalized)
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
