use serde_json::Value;

use super::{classify, FieldKind, FieldRegistry, FieldTarget, SpecialKey};
use crate::host::PreferenceStore;

/// Ids already captured through hard-coded accessors, or counters mirroring a slider.
const DUPLICATE_EXCLUSIONS: [&str; 9] = [
    "themes",
    "customCSS",
    "background",
    "chat_width_slider_counter",
    "font_scale_counter",
    "blur_strength_counter",
    "shadow_width_counter",
    "chat_truncation_counter",
    "streaming_fps_counter",
];

const SENSITIVE_MARKERS: [&str; 22] = [
    "password",
    "api_key",
    "token",
    "secret",
    "auth",
    "login",
    "credential",
    "openai_key",
    "claude_key",
    "palm_key",
    "cohere_key",
    "ai21_key",
    "server_urls",
    "proxy",
    "endpoint",
    "api_url",
    "base_url",
    "user_name",
    "user_id",
    "session",
    "cookie",
    "private_key",
];

const COLOR_PICKER_KEYS: [(&str, &str); 10] = [
    ("main-text-color-picker", "main_text_color"),
    ("italics-color-picker", "italics_text_color"),
    ("underline-color-picker", "underline_text_color"),
    ("quote-color-picker", "quote_text_color"),
    ("shadow-color-picker", "shadow_color"),
    ("chat-tint-color-picker", "chat_tint_color"),
    ("blur-tint-color-picker", "blur_tint_color"),
    ("border-color-picker", "border_color"),
    ("user-mes-blur-tint-color-picker", "user_mes_blur_tint_color"),
    ("bot-mes-blur-tint-color-picker", "bot_mes_blur_tint_color"),
];

const CONTROL_ALIASES: [(&str, &str); 10] = [
    ("blur_strength_slider", "blur_strength"),
    ("shadow_width_slider", "shadow_width"),
    ("font_scale_slider", "font_scale"),
    ("chat_width_slider", "chat_width"),
    ("avatar_style_select", "avatar_style"),
    ("chat_display_select", "chat_display"),
    ("toastr_position_select", "toastr_position"),
    ("fast_ui_mode_checkbox", "fast_ui_mode"),
    ("waifuMode_checkbox", "waifuMode"),
    ("noShadows_checkbox", "noShadows"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Checkbox,
    Slider,
    Select,
    Text,
    ColorPicker,
}

/// One configuration control as rendered by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredControl {
    pub external_id: String,
    pub control: ControlKind,
    pub current_value: Value,
    /// Set when the control only mirrors another control (e.g. a counter).
    pub linked_to: Option<String>,
    pub hidden: bool,
    pub disabled: bool,
}

impl DiscoveredControl {
    pub fn new(external_id: impl Into<String>, control: ControlKind, current_value: Value) -> Self {
        Self {
            external_id: external_id.into(),
            control,
            current_value,
            linked_to: None,
            hidden: false,
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub external_id: String,
    pub canonical_key: String,
    pub kind: FieldKind,
    pub current_value: Value,
}

/// Canonical key for an external control id.
pub fn canonical_key(external_id: &str) -> &str {
    COLOR_PICKER_KEYS
        .iter()
        .chain(CONTROL_ALIASES.iter())
        .find(|(external, _)| *external == external_id)
        .map_or(external_id, |(_, canonical)| *canonical)
}

pub fn describe_controls<P: PreferenceStore + ?Sized>(
    registry: &FieldRegistry,
    prefs: &P,
    controls: &[DiscoveredControl],
) -> Vec<FieldDescriptor> {
    let mut descriptors: Vec<FieldDescriptor> = Vec::new();
    for control in controls {
        let Some(descriptor) = describe_control(registry, prefs, control) else {
            continue;
        };
        if descriptors
            .iter()
            .any(|known| known.canonical_key == descriptor.canonical_key)
        {
            continue;
        }
        descriptors.push(descriptor);
    }
    tracing::debug!(
        discovered = controls.len(),
        eligible = descriptors.len(),
        "described host controls"
    );
    descriptors
}

fn describe_control<P: PreferenceStore + ?Sized>(
    registry: &FieldRegistry,
    prefs: &P,
    control: &DiscoveredControl,
) -> Option<FieldDescriptor> {
    let id = control.external_id.as_str();
    if id.is_empty() || control.linked_to.is_some() || is_excluded(id) {
        return None;
    }
    if control.hidden || control.disabled {
        return None;
    }

    let canonical = canonical_key(id);
    let target = match registry.resolve(prefs, id) {
        Some(target) => target,
        None if control.control == ControlKind::ColorPicker && canonical != id => {
            if !prefs.contains(canonical) {
                return None;
            }
            FieldTarget::Preference(canonical.to_string())
        }
        None => registry.resolve(prefs, canonical)?,
    };

    let host_key = match &target {
        FieldTarget::Preference(key) => key.as_str(),
        FieldTarget::Special(special) => special.as_str(),
    };

    Some(FieldDescriptor {
        external_id: id.to_string(),
        canonical_key: canonical.to_string(),
        kind: classify(canonical, host_key),
        current_value: control.current_value.clone(),
    })
}

fn is_excluded(id: &str) -> bool {
    if DUPLICATE_EXCLUSIONS.contains(&id) {
        return true;
    }
    let lower = id.to_lowercase();
    let sensitive = SENSITIVE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker));
    if sensitive && id != SpecialKey::RelaxedApiUrls.as_str() {
        return true;
    }

    (id.contains("aux_field") && id != SpecialKey::AuxField.as_str())
        || id.contains("debug")
        || id.contains("dev_")
        || id.contains("internal_")
        || (id.contains("pin_") && id != SpecialKey::PinStyles.as_str())
        || id.contains("greeting_")
}
