//! Selection masks: which canonical keys a capture includes.
//!
//! Three masks coexist. The explicit override passed to a capture wins, then
//! the session mask set from the advanced panel, then the persisted default
//! mask layered over [`BUILTIN_DEFAULT_MASK`]. The session mask replaces the
//! default wholesale; the two are never merged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::SpecialKey;

pub const BUILTIN_DEFAULT_MASK: [(&str, bool); 28] = [
    ("theme", true),
    ("customCSS", true),
    ("background", true),
    ("main_text_color", true),
    ("italics_text_color", true),
    ("underline_text_color", true),
    ("quote_text_color", true),
    ("shadow_color", true),
    ("chat_tint_color", true),
    ("blur_tint_color", true),
    ("border_color", true),
    ("user_mes_blur_tint_color", true),
    ("bot_mes_blur_tint_color", true),
    ("blur_strength", true),
    ("shadow_width", true),
    ("font_scale", true),
    ("chat_width", true),
    ("avatar_style", true),
    ("chat_display", true),
    ("toastr_position", true),
    ("fast_ui_mode", true),
    ("waifuMode", true),
    ("noShadows", true),
    ("aux_field", false),
    ("background_thumbnails_animation", false),
    ("relaxed_api_urls", false),
    ("example_messages_behavior", false),
    ("auto-load-chat-checkbox", false),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionMask(BTreeMap<String, bool>);

impl SelectionMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        BUILTIN_DEFAULT_MASK
            .iter()
            .map(|(key, selected)| ((*key).to_string(), *selected))
            .collect()
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, selected: bool) {
        self.0.insert(key.into(), selected);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Selected keys in sorted order.
    pub fn selected_keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(key, selected)| (key.as_str(), *selected))
    }

    pub fn set_all(&mut self, selected: bool) {
        for value in self.0.values_mut() {
            *value = selected;
        }
    }

    /// `self` with every key of `fallback` that `self` lacks.
    pub fn layered_over(&self, fallback: &SelectionMask) -> SelectionMask {
        let mut merged = fallback.clone();
        merged.0.extend(self.0.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }
}

impl FromIterator<(String, bool)> for SelectionMask {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, bool)> for SelectionMask {
    fn from_iter<I: IntoIterator<Item = (&'a str, bool)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, selected)| (key.to_string(), selected))
                .collect(),
        )
    }
}

/// The persisted default mask as captures see it.
pub fn resolved_default_mask(persisted: &SelectionMask) -> SelectionMask {
    persisted.layered_over(&SelectionMask::builtin())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    AlreadyExtended,
    Extended { added: usize },
}

impl ExtendOutcome {
    pub const fn needs_persist(self) -> bool {
        matches!(self, Self::Extended { added } if added > 0)
    }
}

/// Session-scoped mask state. Dropped on reload; never persisted.
#[derive(Debug, Clone, Default)]
pub struct MaskSlots {
    session: Option<SelectionMask>,
    defaults_extended: bool,
}

impl MaskSlots {
    pub fn session(&self) -> Option<&SelectionMask> {
        self.session.as_ref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn set_session(&mut self, mask: SelectionMask) {
        self.session = Some(mask);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }

    pub fn effective(
        &self,
        explicit: Option<&SelectionMask>,
        persisted_default: &SelectionMask,
    ) -> SelectionMask {
        if let Some(explicit) = explicit {
            return explicit.clone();
        }
        if let Some(session) = &self.session {
            return session.clone();
        }
        resolved_default_mask(persisted_default)
    }

    /// Add every newly discovered key to the persisted default mask as
    /// unselected. Runs once per session; existing entries are never touched.
    pub fn extend_defaults<'a, I>(&mut self, persisted: &mut SelectionMask, discovered: I) -> ExtendOutcome
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.defaults_extended {
            return ExtendOutcome::AlreadyExtended;
        }
        self.defaults_extended = true;

        let mut added = 0;
        let mut insert_unselected = |key: &str| {
            if !persisted.contains(key) {
                persisted.set(key, false);
                added += 1;
            }
        };
        for key in discovered {
            insert_unselected(key);
        }
        for special in SpecialKey::ALL.into_iter().filter(|s| s.is_dedicated()) {
            insert_unselected(special.as_str());
        }
        tracing::debug!(added, total = persisted.len(), "extended default selection mask");
        ExtendOutcome::Extended { added }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_mask_selects_core_theme_fields_only() {
        let mask = SelectionMask::builtin();
        assert_eq!(mask.len(), 28);
        assert!(mask.is_selected("theme"));
        assert!(mask.is_selected("noShadows"));
        assert!(!mask.is_selected("aux_field"));
        assert!(!mask.is_selected("not_listed"));
    }

    #[test]
    fn session_mask_wins_wholesale_over_defaults() {
        let mut slots = MaskSlots::default();
        slots.set_session([("a", true)].into_iter().collect());
        let persisted: SelectionMask = [("a", false), ("b", true)].into_iter().collect();

        let effective = slots.effective(None, &persisted);
        let expected: SelectionMask = [("a", true)].into_iter().collect();
        assert_eq!(effective, expected);
    }

    #[test]
    fn explicit_override_beats_session_mask() {
        let mut slots = MaskSlots::default();
        slots.set_session([("a", true)].into_iter().collect());
        let explicit: SelectionMask = [("c", true)].into_iter().collect();

        assert_eq!(
            slots.effective(Some(&explicit), &SelectionMask::new()),
            explicit
        );
    }

    #[test]
    fn persisted_defaults_layer_over_builtin_constant() {
        let slots = MaskSlots::default();
        let persisted: SelectionMask = [("theme", false), ("extra", true)].into_iter().collect();

        let effective = slots.effective(None, &persisted);
        assert!(!effective.is_selected("theme"));
        assert!(effective.is_selected("extra"));
        assert!(effective.is_selected("customCSS"));
        assert_eq!(effective.len(), 29);
    }

    #[test]
    fn extend_defaults_adds_unselected_keys_once() {
        let mut slots = MaskSlots::default();
        let mut persisted: SelectionMask = [("chat_width", true)].into_iter().collect();

        let first = slots.extend_defaults(&mut persisted, ["chat_width", "swipes"]);
        assert_eq!(first, ExtendOutcome::Extended { added: 6 });
        assert!(first.needs_persist());
        assert!(persisted.is_selected("chat_width"));
        assert!(persisted.contains("swipes"));
        assert!(!persisted.is_selected("swipes"));
        assert!(persisted.contains("auto-load-chat-checkbox"));

        let snapshot = persisted.clone();
        let second = slots.extend_defaults(&mut persisted, ["another_key"]);
        assert_eq!(second, ExtendOutcome::AlreadyExtended);
        assert!(!second.needs_persist());
        assert_eq!(persisted, snapshot);
    }

    #[test]
    fn set_all_toggles_every_known_key() {
        let mut mask = SelectionMask::builtin();
        mask.set_all(true);
        assert_eq!(mask.selected_keys().count(), 28);
        mask.set_all(false);
        assert_eq!(mask.selected_keys().count(), 0);
    }
}
