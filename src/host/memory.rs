//! In-process host used by embedders without a live chat host and by tests.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::{ActiveScopes, FieldFeed, HostAccessors, HostError, HostResult, PreferenceStore};
use crate::registry::discovery::DiscoveredControl;
use crate::registry::{FieldEffect, SpecialKey};
use crate::snapshot::Background;

/// Everything observable about the host's configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryHostState {
    pub preferences: Vec<(String, Value)>,
    pub special: BTreeMap<SpecialKey, Value>,
    pub active_theme: Option<String>,
    pub custom_css: String,
    pub background: Option<Background>,
}

type ApplyAllHook = Box<dyn FnMut(&mut MemoryHost)>;

#[derive(Default)]
pub struct MemoryHost {
    state: MemoryHostState,
    conversation: Option<String>,
    persona: Option<String>,
    controls: Vec<DiscoveredControl>,
    rejected_keys: BTreeSet<String>,
    applied_effects: Vec<FieldEffect>,
    apply_all_calls: usize,
    apply_all_hook: Option<ApplyAllHook>,
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("state", &self.state)
            .field("conversation", &self.conversation)
            .field("persona", &self.persona)
            .field("apply_all_calls", &self.apply_all_calls)
            .finish_non_exhaustive()
    }
}

impl MemoryHost {
    pub fn state(&self) -> &MemoryHostState {
        &self.state
    }

    /// Insert or overwrite a preference, keeping first-insertion order.
    pub fn insert_preference(&mut self, key: &str, value: Value) {
        match self.state.preferences.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.state.preferences.push((key.to_string(), value)),
        }
    }

    pub fn set_theme_state(
        &mut self,
        active_theme: Option<&str>,
        custom_css: &str,
        background: Option<Background>,
    ) {
        self.state.active_theme = active_theme.map(str::to_string);
        self.state.custom_css = custom_css.to_string();
        self.state.background = background;
    }

    pub fn set_special(&mut self, key: SpecialKey, value: Value) {
        self.state.special.insert(key, value);
    }

    pub fn set_active_conversation(&mut self, id: Option<&str>) {
        self.conversation = id.map(str::to_string);
    }

    pub fn set_active_persona(&mut self, id: Option<&str>) {
        self.persona = id.map(str::to_string);
    }

    pub fn set_controls(&mut self, controls: Vec<DiscoveredControl>) {
        self.controls = controls;
    }

    /// Make every later write to `key` fail. For the dedicated accessors
    /// (`theme`, `customCSS`, `background`, special keys) the accessor itself
    /// reports as unavailable.
    pub fn reject_writes_to(&mut self, key: &str) {
        self.rejected_keys.insert(key.to_string());
    }

    pub fn on_apply_all(&mut self, hook: ApplyAllHook) {
        self.apply_all_hook = Some(hook);
    }

    pub fn apply_all_calls(&self) -> usize {
        self.apply_all_calls
    }

    /// Field callbacks fired so far, in call order.
    pub fn applied_effects(&self) -> &[FieldEffect] {
        &self.applied_effects
    }

    fn check_writable(&self, key: &str) -> HostResult<()> {
        if self.rejected_keys.contains(key) {
            return Err(HostError::FieldRejected {
                key: key.to_string(),
                message: "write rejected by host".to_string(),
            });
        }
        Ok(())
    }

    fn check_accessor(&self, name: &str) -> HostResult<()> {
        if self.rejected_keys.contains(name) {
            return Err(HostError::Unavailable(name.to_string()));
        }
        Ok(())
    }
}

impl PreferenceStore for MemoryHost {
    fn get(&self, key: &str) -> Option<Value> {
        self.state
            .preferences
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
    }

    fn set(&mut self, key: &str, value: Value) -> HostResult<()> {
        self.check_writable(key)?;
        self.insert_preference(key, value);
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.state.preferences.iter().any(|(k, _)| k == key)
    }

    fn keys(&self) -> Vec<String> {
        self.state
            .preferences
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl HostAccessors for MemoryHost {
    fn active_theme(&self) -> Option<String> {
        self.state.active_theme.clone()
    }

    fn set_active_theme(&mut self, name: &str) -> HostResult<()> {
        self.check_accessor("theme")?;
        self.state.active_theme = Some(name.to_string());
        Ok(())
    }

    fn custom_css(&self) -> String {
        self.state.custom_css.clone()
    }

    fn set_custom_css(&mut self, css: &str) -> HostResult<()> {
        self.check_accessor("customCSS")?;
        self.state.custom_css = css.to_string();
        Ok(())
    }

    fn background(&self) -> Option<Background> {
        self.state.background.clone()
    }

    fn set_background(&mut self, background: &Background) -> HostResult<()> {
        self.check_accessor("background")?;
        self.state.background = Some(background.clone());
        Ok(())
    }

    fn special_value(&self, key: SpecialKey) -> Option<Value> {
        Some(
            self.state
                .special
                .get(&key)
                .cloned()
                .unwrap_or_else(|| key.default_value()),
        )
    }

    fn set_special_value(&mut self, key: SpecialKey, value: &Value) -> HostResult<()> {
        self.check_accessor(key.as_str())?;
        self.state.special.insert(key, value.clone());
        Ok(())
    }

    fn field_applied(&mut self, effect: FieldEffect) {
        self.applied_effects.push(effect);
    }

    fn apply_all(&mut self) {
        self.apply_all_calls += 1;
        if let Some(mut hook) = self.apply_all_hook.take() {
            hook(self);
            self.apply_all_hook = Some(hook);
        }
    }
}

impl ActiveScopes for MemoryHost {
    fn active_conversation(&self) -> Option<String> {
        self.conversation.clone()
    }

    fn active_persona(&self) -> Option<String> {
        self.persona.clone()
    }
}

impl FieldFeed for MemoryHost {
    fn discover(&self) -> Vec<DiscoveredControl> {
        self.controls.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preferences_keep_insertion_order_and_overwrite_in_place() {
        let mut host = MemoryHost::default();
        host.insert_preference("b", json!(1));
        host.insert_preference("a", json!(2));
        host.insert_preference("b", json!(3));

        assert_eq!(host.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(host.get("b"), Some(json!(3)));
    }

    #[test]
    fn rejected_keys_fail_without_mutating() {
        let mut host = MemoryHost::default();
        host.insert_preference("chat_width", json!(50));
        host.reject_writes_to("chat_width");

        assert!(host.set("chat_width", json!(10)).is_err());
        assert_eq!(host.get("chat_width"), Some(json!(50)));
    }

    #[test]
    fn rejected_accessors_report_unavailable() {
        let mut host = MemoryHost::default();
        host.set_theme_state(Some("Default"), "", None);
        host.reject_writes_to("theme");
        host.reject_writes_to(SpecialKey::AuxField.as_str());

        assert!(matches!(
            host.set_active_theme("Dark"),
            Err(HostError::Unavailable(name)) if name == "theme"
        ));
        assert!(matches!(
            host.set_special_value(SpecialKey::AuxField, &json!("x")),
            Err(HostError::Unavailable(_))
        ));
        assert_eq!(host.active_theme().as_deref(), Some("Default"));
    }

    #[test]
    fn unset_special_keys_report_host_defaults() {
        let host = MemoryHost::default();
        assert_eq!(
            host.special_value(SpecialKey::ExampleMessagesBehavior),
            Some(json!("normal"))
        );
        assert_eq!(host.special_value(SpecialKey::PinStyles), Some(json!(false)));
    }
}
