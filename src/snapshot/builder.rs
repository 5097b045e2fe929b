use serde_json::Value;

use super::{Snapshot, BACKGROUND_KEY, CUSTOM_CSS_KEY, HARDCODED_THEME_KEYS, THEME_KEY};
use crate::host::{HostAccessors, PreferenceStore};
use crate::mask::SelectionMask;
use crate::registry::{classify, FieldKind, FieldRegistry, FieldTarget, SpecialKey};

const FALLBACK_THEME_NAME: &str = "default";

/// Which mask a capture was built from; recorded on the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOrigin {
    /// Session selection from the advanced panel.
    Advanced,
    /// Persisted default selection.
    Defaults,
    /// Mask handed in by the caller.
    Explicit,
}

pub struct SnapshotBuilder<'r> {
    registry: &'r FieldRegistry,
}

impl<'r> SnapshotBuilder<'r> {
    pub const fn new(registry: &'r FieldRegistry) -> Self {
        Self { registry }
    }

    /// Capture every selected key that resolves on the host. Output depends only
    /// on host state, mask, and `timestamp`.
    pub fn capture<H>(
        &self,
        host: &H,
        mask: &SelectionMask,
        origin: CaptureOrigin,
        timestamp: i64,
    ) -> Snapshot
    where
        H: PreferenceStore + HostAccessors + ?Sized,
    {
        let mut snapshot = Snapshot {
            timestamp,
            saved_with_advanced_settings: origin == CaptureOrigin::Advanced,
            saved_with_default_settings: origin == CaptureOrigin::Defaults,
            ..Snapshot::default()
        };

        self.capture_hardcoded(host, mask, &mut snapshot);

        for key in mask.selected_keys() {
            if HARDCODED_THEME_KEYS.contains(&key) {
                continue;
            }
            let Some((kind, value)) = self.read_field(host, key) else {
                tracing::debug!(key, "selected field not resolvable; skipped");
                continue;
            };
            match kind {
                FieldKind::Theme => snapshot.theme.insert(key.to_string(), value),
                FieldKind::Preference => snapshot.settings.insert(key.to_string(), value),
            };
        }

        tracing::debug!(
            theme_fields = snapshot.theme.len(),
            setting_fields = snapshot.settings.len(),
            ?origin,
            "captured snapshot"
        );
        snapshot
    }

    fn capture_hardcoded<H>(&self, host: &H, mask: &SelectionMask, snapshot: &mut Snapshot)
    where
        H: HostAccessors + ?Sized,
    {
        if mask.is_selected(THEME_KEY) {
            let name = host
                .active_theme()
                .unwrap_or_else(|| FALLBACK_THEME_NAME.to_string());
            snapshot.theme.insert(THEME_KEY.to_string(), Value::String(name));
        }
        if mask.is_selected(CUSTOM_CSS_KEY) {
            snapshot
                .theme
                .insert(CUSTOM_CSS_KEY.to_string(), Value::String(host.custom_css()));
        }
        if mask.is_selected(BACKGROUND_KEY) {
            let Some(current) = host.background() else {
                tracing::warn!("current background unavailable; not captured");
                return;
            };
            let Some(background) = current.normalized() else {
                tracing::warn!(path = %current.path, "current background has no usable path; not captured");
                return;
            };
            match serde_json::to_value(background) {
                Ok(value) => {
                    snapshot.theme.insert(BACKGROUND_KEY.to_string(), value);
                }
                Err(err) => tracing::warn!(?err, "failed to encode current background"),
            }
        }
    }

    fn read_field<H>(&self, host: &H, key: &str) -> Option<(FieldKind, Value)>
    where
        H: PreferenceStore + HostAccessors + ?Sized,
    {
        if let Some(special) = SpecialKey::dedicated(key) {
            let value = host.special_value(special)?;
            return Some((classify(key, special.as_str()), value));
        }

        match self.registry.resolve(host, key)? {
            FieldTarget::Preference(host_key) => {
                let value = host.get(&host_key)?;
                Some((classify(key, &host_key), value))
            }
            FieldTarget::Special(special) => {
                let value = host.special_value(special)?;
                Some((classify(key, special.as_str()), value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::snapshot::Background;
    use serde_json::json;

    fn styled_host() -> MemoryHost {
        let mut host = MemoryHost::default();
        host.set_theme_state(
            Some("Dark V 1.0"),
            "body { color: red; }",
            Some(Background::new("backgrounds/tavern.jpg", "cover", false)),
        );
        host.insert_preference("main_text_color", json!("rgb(220, 220, 210)"));
        host.insert_preference("chat_width", json!(50));
        host.insert_preference("fast_ui_mode", json!(true));
        host.insert_preference("auto_swipe", json!(false));
        host.set_special(SpecialKey::AuxField, json!("character_version"));
        host
    }

    fn mask(keys: &[(&str, bool)]) -> SelectionMask {
        keys.iter().copied().collect()
    }

    #[test]
    fn capture_splits_selected_fields_into_theme_and_settings() {
        let host = styled_host();
        let registry = FieldRegistry::default();
        let builder = SnapshotBuilder::new(&registry);
        let mask = mask(&[
            ("theme", true),
            ("customCSS", true),
            ("background", true),
            ("main_text_color", true),
            ("chat_width", true),
            ("fast_ui_mode", true),
            ("aux_field", true),
            ("auto_swipe", false),
        ]);

        let snapshot = builder.capture(&host, &mask, CaptureOrigin::Defaults, 1000);

        assert_eq!(snapshot.theme_name(), Some("Dark V 1.0"));
        assert_eq!(snapshot.theme.get("customCSS"), Some(&json!("body { color: red; }")));
        assert_eq!(
            snapshot.background(),
            Some(Background::new("backgrounds/tavern.jpg", "cover", false))
        );
        assert!(snapshot.theme.contains_key("main_text_color"));
        assert!(snapshot.theme.contains_key("chat_width"));
        assert_eq!(snapshot.settings.get("fast_ui_mode"), Some(&json!(true)));
        assert_eq!(snapshot.settings.get("aux_field"), Some(&json!("character_version")));
        assert!(snapshot.value("auto_swipe").is_none());
        assert!(snapshot.saved_with_default_settings);
        assert!(!snapshot.saved_with_advanced_settings);
        assert_eq!(snapshot.timestamp, 1000);
    }

    #[test]
    fn capture_keeps_theme_and_settings_disjoint_and_mask_bound() {
        let host = styled_host();
        let registry = FieldRegistry::default();
        let builder = SnapshotBuilder::new(&registry);
        let mask = SelectionMask::builtin().layered_over(&mask(&[("auto_swipe", true)]));

        let snapshot = builder.capture(&host, &mask, CaptureOrigin::Explicit, 5);

        for key in snapshot.theme.keys() {
            assert!(!snapshot.settings.contains_key(key));
            assert!(mask.is_selected(key));
        }
        for key in snapshot.settings.keys() {
            assert!(mask.is_selected(key));
        }
        assert!(snapshot.settings.contains_key("auto_swipe"));
    }

    #[test]
    fn capture_skips_unresolvable_and_missing_background() {
        let mut host = styled_host();
        host.set_theme_state(None, "", None);
        let registry = FieldRegistry::default();
        let builder = SnapshotBuilder::new(&registry);
        let mask = mask(&[("theme", true), ("background", true), ("ghost_field", true)]);

        let snapshot = builder.capture(&host, &mask, CaptureOrigin::Advanced, 0);

        assert_eq!(snapshot.theme_name(), Some("default"));
        assert!(snapshot.background().is_none());
        assert!(snapshot.value("ghost_field").is_none());
        assert!(snapshot.saved_with_advanced_settings);
    }

    #[test]
    fn capture_stores_background_in_normalized_form() {
        let mut host = styled_host();
        host.set_theme_state(
            Some("Dark V 1.0"),
            "",
            Some(Background::new("backgrounds//backgrounds/dusk%20sky.jpg.jpg", "", false)),
        );
        let registry = FieldRegistry::default();
        let mask = mask(&[("background", true)]);

        let snapshot = SnapshotBuilder::new(&registry).capture(&host, &mask, CaptureOrigin::Explicit, 0);

        let background = snapshot.background().unwrap();
        assert_eq!(background.path, "backgrounds/dusk sky.jpg");
        assert_eq!(background.style, "cover");

        host.set_theme_state(None, "", Some(Background::new(" ", "cover", false)));
        let snapshot = SnapshotBuilder::new(&registry).capture(&host, &mask, CaptureOrigin::Explicit, 0);
        assert!(snapshot.background().is_none());
    }

    #[test]
    fn capture_is_deterministic_apart_from_timestamp() {
        let host = styled_host();
        let registry = FieldRegistry::default();
        let builder = SnapshotBuilder::new(&registry);
        let mask = SelectionMask::builtin();

        let first = builder.capture(&host, &mask, CaptureOrigin::Defaults, 1);
        let mut second = builder.capture(&host, &mask, CaptureOrigin::Defaults, 2);
        second.timestamp = first.timestamp;

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
