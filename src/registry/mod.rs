use crate::host::PreferenceStore;

pub mod discovery;

/// Irregular external ids whose host key cannot be derived mechanically.
const OVERRIDE_TABLE: [(&str, &str); 7] = [
    ("messageTimerEnabled", "timer_enabled"),
    ("messageTimestampsEnabled", "timestamps_enabled"),
    ("messageModelIconEnabled", "timestamp_model_icon"),
    ("mesIDDisplayEnabled", "mesIDDisplay_enabled"),
    ("hideChatAvatarsEnabled", "hideChatAvatars_enabled"),
    ("messageTokensEnabled", "message_token_count_enabled"),
    ("pin_styles", "pin_styles"),
];

const STRIPPED_PREFIXES: [&str; 4] = ["message", "chat", "user", "power"];

const THEME_KEYWORDS: [&str; 12] = [
    "color",
    "theme",
    "css",
    "blur",
    "shadow",
    "font",
    "chat_width",
    "avatar_style",
    "chat_display",
    "toastr_position",
    "tint",
    "border",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Theme,
    Preference,
}

/// Fields read and written through dedicated host accessors instead of the
/// preference object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecialKey {
    AuxField,
    BackgroundThumbnailsAnimation,
    RelaxedApiUrls,
    ExampleMessagesBehavior,
    AutoLoadChat,
    MessageTimer,
    MessageTimestamps,
    MessageModelIcon,
    MesIdDisplay,
    HideChatAvatars,
    MessageTokens,
    PinStyles,
}

impl SpecialKey {
    pub const ALL: [SpecialKey; 12] = [
        Self::AuxField,
        Self::BackgroundThumbnailsAnimation,
        Self::RelaxedApiUrls,
        Self::ExampleMessagesBehavior,
        Self::AutoLoadChat,
        Self::MessageTimer,
        Self::MessageTimestamps,
        Self::MessageModelIcon,
        Self::MesIdDisplay,
        Self::HideChatAvatars,
        Self::MessageTokens,
        Self::PinStyles,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuxField => "aux_field",
            Self::BackgroundThumbnailsAnimation => "background_thumbnails_animation",
            Self::RelaxedApiUrls => "relaxed_api_urls",
            Self::ExampleMessagesBehavior => "example_messages_behavior",
            Self::AutoLoadChat => "auto-load-chat-checkbox",
            Self::MessageTimer => "messageTimerEnabled",
            Self::MessageTimestamps => "messageTimestampsEnabled",
            Self::MessageModelIcon => "messageModelIconEnabled",
            Self::MesIdDisplay => "mesIDDisplayEnabled",
            Self::HideChatAvatars => "hideChatAvatarsEnabled",
            Self::MessageTokens => "messageTokensEnabled",
            Self::PinStyles => "pin_styles",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|special| special.as_str() == key)
    }

    /// Keys that never exist in the preference object and always go through
    /// their accessor, even during capture and apply.
    pub const fn is_dedicated(self) -> bool {
        matches!(
            self,
            Self::AuxField
                | Self::BackgroundThumbnailsAnimation
                | Self::RelaxedApiUrls
                | Self::ExampleMessagesBehavior
                | Self::AutoLoadChat
        )
    }

    pub fn dedicated(key: &str) -> Option<Self> {
        Self::from_key(key).filter(|special| special.is_dedicated())
    }

    pub fn default_value(self) -> serde_json::Value {
        match self {
            Self::AuxField => serde_json::Value::String(String::new()),
            Self::ExampleMessagesBehavior => serde_json::Value::String("normal".to_string()),
            _ => serde_json::Value::Bool(false),
        }
    }
}

/// Host-side re-render hook for each color key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSlot {
    Main,
    Italics,
    Underline,
    Quote,
    Shadow,
    ChatTint,
    BlurTint,
    Border,
    UserMesBlurTint,
    BotMesBlurTint,
}

impl ColorSlot {
    pub fn for_key(key: &str) -> Option<Self> {
        let slot = match key {
            "main_text_color" => Self::Main,
            "italics_text_color" => Self::Italics,
            "underline_text_color" => Self::Underline,
            "quote_text_color" => Self::Quote,
            "shadow_color" => Self::Shadow,
            "chat_tint_color" => Self::ChatTint,
            "blur_tint_color" => Self::BlurTint,
            "border_color" => Self::Border,
            "user_mes_blur_tint_color" => Self::UserMesBlurTint,
            "bot_mes_blur_tint_color" => Self::BotMesBlurTint,
            _ => return None,
        };
        Some(slot)
    }
}

/// Host-side callback owed after a successful write to one host key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldEffect {
    Color(ColorSlot),
    UiMode,
    NoShadows,
    MovingUi,
    WaifuMode,
    SpoilerFreeMode,
    ReducedMotion,
    CompactInputArea,
    /// Re-laid out even when the value did not change.
    FontScale,
    /// Re-laid out even when the value did not change.
    ChatWidth,
    BlurStrength,
    ShadowWidth,
    AvatarStyle,
    ChatDisplay,
    ToastrPosition,
}

impl FieldEffect {
    pub fn for_key(host_key: &str) -> Option<Self> {
        let effect = match host_key {
            "fast_ui_mode" => Self::UiMode,
            "noShadows" => Self::NoShadows,
            "movingUI" => Self::MovingUi,
            "waifuMode" => Self::WaifuMode,
            "spoiler_free_mode" => Self::SpoilerFreeMode,
            "reduced_motion" => Self::ReducedMotion,
            "compact_input_area" => Self::CompactInputArea,
            "font_scale" => Self::FontScale,
            "chat_width" => Self::ChatWidth,
            "blur_strength" => Self::BlurStrength,
            "shadow_width" => Self::ShadowWidth,
            "avatar_style" => Self::AvatarStyle,
            "chat_display" => Self::ChatDisplay,
            "toastr_position" => Self::ToastrPosition,
            _ => return ColorSlot::for_key(host_key).map(Self::Color),
        };
        Some(effect)
    }
}

/// Where a canonical key lives on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Preference(String),
    Special(SpecialKey),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryOptions {
    pub substring_fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    options: RegistryOptions,
}

impl FieldRegistry {
    pub const fn new(options: RegistryOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Map an external id (or canonical key) onto the host. First match wins:
    /// exact key, override table, mechanical transforms, optional substring
    /// heuristic, special accessors.
    pub fn resolve<P: PreferenceStore + ?Sized>(&self, prefs: &P, id: &str) -> Option<FieldTarget> {
        if id.is_empty() {
            return None;
        }
        if prefs.contains(id) {
            return Some(FieldTarget::Preference(id.to_string()));
        }

        if let Some((_, mapped)) = OVERRIDE_TABLE.iter().find(|(external, _)| *external == id) {
            if prefs.contains(mapped) {
                return Some(FieldTarget::Preference((*mapped).to_string()));
            }
        }

        if let Some(key) = key_transforms(id)
            .into_iter()
            .find(|candidate| !candidate.is_empty() && prefs.contains(candidate))
        {
            return Some(FieldTarget::Preference(key));
        }

        if self.options.substring_fallback {
            if let Some(key) = closest_substring_match(id, &prefs.keys()) {
                tracing::warn!(id, host_key = %key, "resolved field through substring heuristic");
                return Some(FieldTarget::Preference(key));
            }
        }

        SpecialKey::from_key(id).map(FieldTarget::Special)
    }
}

/// Theme when the canonical key plus host key mention any theme keyword.
pub fn classify(canonical_key: &str, host_key: &str) -> FieldKind {
    let haystack = format!("{canonical_key}{host_key}").to_lowercase();
    if THEME_KEYWORDS
        .iter()
        .any(|keyword| haystack.contains(keyword))
    {
        FieldKind::Theme
    } else {
        FieldKind::Preference
    }
}

fn key_transforms(id: &str) -> [String; 5] {
    [
        id.replace('-', "_"),
        id.replace('_', ""),
        camel_to_snake(id),
        strip_suffix_ignore_case(&strip_suffix_ignore_case(id, "checkbox"), "enabled"),
        strip_common_prefix(id),
    ]
}

fn camel_to_snake(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 4);
    for ch in id.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

fn strip_suffix_ignore_case(id: &str, suffix: &str) -> String {
    let split = id.len().saturating_sub(suffix.len());
    match (id.get(..split), id.get(split..)) {
        (Some(head), Some(tail)) if tail.eq_ignore_ascii_case(suffix) => head.to_string(),
        _ => id.to_string(),
    }
}

fn strip_common_prefix(id: &str) -> String {
    for prefix in STRIPPED_PREFIXES {
        let Some(head) = id.get(..prefix.len()) else {
            continue;
        };
        if head.eq_ignore_ascii_case(prefix) {
            let rest = &id[prefix.len()..];
            return rest.strip_prefix('_').unwrap_or(rest).to_string();
        }
    }
    id.to_string()
}

fn closest_substring_match(id: &str, keys: &[String]) -> Option<String> {
    keys.iter()
        .filter(|key| !key.is_empty() && (key.contains(id) || id.contains(key.as_str())))
        .min_by(|a, b| {
            a.len()
                .abs_diff(id.len())
                .cmp(&b.len().abs_diff(id.len()))
                .then_with(|| a.cmp(b))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use serde_json::json;

    fn host_with(keys: &[&str]) -> MemoryHost {
        let mut host = MemoryHost::default();
        for key in keys {
            host.insert_preference(key, json!(true));
        }
        host
    }

    #[test]
    fn resolve_prefers_exact_key() {
        let host = host_with(&["fast_ui_mode", "fastuimode"]);
        let registry = FieldRegistry::default();
        assert_eq!(
            registry.resolve(&host, "fast_ui_mode"),
            Some(FieldTarget::Preference("fast_ui_mode".to_string()))
        );
    }

    #[test]
    fn resolve_uses_override_table_before_transforms() {
        let host = host_with(&["timer_enabled", "messageTimer"]);
        let registry = FieldRegistry::default();
        assert_eq!(
            registry.resolve(&host, "messageTimerEnabled"),
            Some(FieldTarget::Preference("timer_enabled".to_string()))
        );
    }

    #[test]
    fn resolve_applies_mechanical_transforms_in_order() {
        let registry = FieldRegistry::default();

        let host = host_with(&["auto_fix_markdown"]);
        assert_eq!(
            registry.resolve(&host, "auto-fix-markdown"),
            Some(FieldTarget::Preference("auto_fix_markdown".to_string()))
        );

        let host = host_with(&["waifu_mode"]);
        assert_eq!(
            registry.resolve(&host, "waifuMode"),
            Some(FieldTarget::Preference("waifu_mode".to_string()))
        );

        let host = host_with(&["swipes"]);
        assert_eq!(
            registry.resolve(&host, "swipesCheckbox"),
            Some(FieldTarget::Preference("swipes".to_string()))
        );

        let host = host_with(&["token_padding"]);
        assert_eq!(
            registry.resolve(&host, "user_token_padding"),
            Some(FieldTarget::Preference("token_padding".to_string()))
        );
    }

    #[test]
    fn resolve_skips_substring_matches_unless_enabled() {
        let host = host_with(&["blur", "blur_strength"]);

        let strict = FieldRegistry::default();
        assert_eq!(strict.resolve(&host, "blur_strength_slider"), None);

        let lenient = FieldRegistry::new(RegistryOptions {
            substring_fallback: true,
        });
        assert_eq!(
            lenient.resolve(&host, "blur_strength_slider"),
            Some(FieldTarget::Preference("blur_strength".to_string()))
        );
    }

    #[test]
    fn substring_fallback_is_independent_of_enumeration_order() {
        let keys_a = vec!["chat_width".to_string(), "chat".to_string()];
        let keys_b = vec!["chat".to_string(), "chat_width".to_string()];
        assert_eq!(
            closest_substring_match("chat_width_slider", &keys_a),
            closest_substring_match("chat_width_slider", &keys_b)
        );
        assert_eq!(
            closest_substring_match("chat_width_slider", &keys_a).as_deref(),
            Some("chat_width")
        );
    }

    #[test]
    fn resolve_falls_back_to_special_accessors() {
        let host = host_with(&[]);
        let registry = FieldRegistry::default();
        assert_eq!(
            registry.resolve(&host, "auto-load-chat-checkbox"),
            Some(FieldTarget::Special(SpecialKey::AutoLoadChat))
        );
        assert_eq!(
            registry.resolve(&host, "messageTimerEnabled"),
            Some(FieldTarget::Special(SpecialKey::MessageTimer))
        );
        assert_eq!(registry.resolve(&host, "no_such_field"), None);
    }

    #[test]
    fn classify_uses_theme_keywords_across_both_keys() {
        assert_eq!(classify("main_text_color", "main_text_color"), FieldKind::Theme);
        assert_eq!(classify("waifuMode", "waifuMode"), FieldKind::Preference);
        assert_eq!(classify("noShadows", "noShadows"), FieldKind::Theme);
        assert_eq!(classify("my_setting", "font_scale"), FieldKind::Theme);
        assert_eq!(classify("chat_truncation", "chat_truncation"), FieldKind::Preference);
    }

    #[test]
    fn special_keys_split_into_dedicated_and_mapped_groups() {
        assert_eq!(SpecialKey::ALL.iter().filter(|k| k.is_dedicated()).count(), 5);
        assert_eq!(SpecialKey::dedicated("aux_field"), Some(SpecialKey::AuxField));
        assert_eq!(SpecialKey::dedicated("pin_styles"), None);
        assert_eq!(SpecialKey::from_key("pin_styles"), Some(SpecialKey::PinStyles));
    }

    #[test]
    fn field_effects_cover_layout_toggles_and_colors() {
        assert_eq!(FieldEffect::for_key("fast_ui_mode"), Some(FieldEffect::UiMode));
        assert_eq!(FieldEffect::for_key("chat_width"), Some(FieldEffect::ChatWidth));
        assert_eq!(FieldEffect::for_key("movingUI"), Some(FieldEffect::MovingUi));
        assert_eq!(
            FieldEffect::for_key("border_color"),
            Some(FieldEffect::Color(ColorSlot::Border))
        );
        assert_eq!(FieldEffect::for_key("auto_swipe"), None);
    }

    #[test]
    fn prefix_and_suffix_stripping_are_case_insensitive() {
        assert_eq!(strip_common_prefix("Message_timer"), "timer");
        assert_eq!(strip_common_prefix("powerUser"), "User");
        assert_eq!(strip_suffix_ignore_case("fooCheckbox", "checkbox"), "foo");
        assert_eq!(strip_suffix_ignore_case("box", "checkbox"), "box");
    }
}
