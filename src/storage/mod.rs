use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::snapshot::Snapshot;

pub mod auto_slot;

pub use auto_slot::AutoSlot;

/// Key of the snapshot inside this extension's metadata sub-tree.
pub const THEME_DATA_KEY: &str = "themeData";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("scope metadata unavailable for {0}")]
    Unavailable(Scope),
    #[error("failed to write scope metadata for {scope}: {message}")]
    Write { scope: Scope, message: String },
    #[error("failed to encode snapshot")]
    Encode(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Explicitly discard the outcome of a background persistence call, logging a failure.
pub trait Detach {
    fn detach(self, operation: &str);
}

impl<T, E: fmt::Display> Detach for Result<T, E> {
    fn detach(self, operation: &str) {
        if let Err(err) = self {
            tracing::warn!(operation, %err, "background persistence failed");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScopeKind {
    #[serde(rename = "chat")]
    Conversation,
    #[serde(rename = "character")]
    Persona,
}

impl ScopeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Persona => "persona",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub kind: ScopeKind,
    pub id: String,
}

impl Scope {
    pub fn conversation(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Conversation,
            id: id.into(),
        }
    }

    pub fn persona(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Persona,
            id: id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.label(), self.id)
    }
}

/// Primary tier: the extension's sub-tree inside each scope's own metadata.
pub trait ScopeMetadata {
    fn read(&self, scope: &Scope) -> StorageResult<Option<Value>>;
    fn write(&mut self, scope: &Scope, subtree: Value) -> StorageResult<()>;
    /// Returns whether anything was removed.
    fn remove(&mut self, scope: &Scope) -> StorageResult<bool>;
    fn scopes_with_data(&self) -> StorageResult<Vec<Scope>>;
}

/// Secondary tier: central per-kind maps kept in the extension settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralThemes {
    #[serde(default)]
    pub chat_themes: BTreeMap<String, Snapshot>,
    #[serde(default)]
    pub character_themes: BTreeMap<String, Snapshot>,
}

impl CentralThemes {
    pub fn map(&self, kind: ScopeKind) -> &BTreeMap<String, Snapshot> {
        match kind {
            ScopeKind::Conversation => &self.chat_themes,
            ScopeKind::Persona => &self.character_themes,
        }
    }

    pub fn map_mut(&mut self, kind: ScopeKind) -> &mut BTreeMap<String, Snapshot> {
        match kind {
            ScopeKind::Conversation => &mut self.chat_themes,
            ScopeKind::Persona => &mut self.character_themes,
        }
    }

    pub fn clear(&mut self) {
        self.chat_themes.clear();
        self.character_themes.clear();
    }

    pub fn merge_from(&mut self, other: CentralThemes) {
        self.chat_themes.extend(other.chat_themes);
        self.character_themes.extend(other.character_themes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed { primary: bool, secondary: bool },
    NothingToDelete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub removed: usize,
    pub failed: usize,
}

pub struct ScopeStore<'a, M: ?Sized> {
    primary: &'a mut M,
    central: &'a mut CentralThemes,
}

impl<'a, M: ScopeMetadata + ?Sized> ScopeStore<'a, M> {
    pub fn new(primary: &'a mut M, central: &'a mut CentralThemes) -> Self {
        Self { primary, central }
    }

    /// Write both tiers. A failing tier is logged and never stops the other.
    pub fn save(&mut self, scope: &Scope, snapshot: &Snapshot) {
        encode_subtree(snapshot)
            .and_then(|subtree| self.primary.write(scope, subtree))
            .detach("write scope metadata");
        self.central
            .map_mut(scope.kind)
            .insert(scope.id.clone(), snapshot.clone());
        tracing::debug!(scope = %scope, "saved scope snapshot");
    }

    pub fn load(&self, scope: &Scope) -> Option<Snapshot> {
        load_snapshot(&*self.primary, &*self.central, scope)
    }

    pub fn exists(&self, scope: &Scope) -> bool {
        self.load(scope).is_some()
    }

    pub fn delete(&mut self, scope: &Scope) -> DeleteOutcome {
        let primary = match self.primary.remove(scope) {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!(scope = %scope, %err, "failed to remove scope metadata");
                false
            }
        };
        let secondary = self.central.map_mut(scope.kind).remove(&scope.id).is_some();

        if primary || secondary {
            tracing::debug!(scope = %scope, primary, secondary, "deleted scope snapshot");
            DeleteOutcome::Removed { primary, secondary }
        } else {
            DeleteOutcome::NothingToDelete
        }
    }
}

/// Primary tier first, central map second. Absence is not an error, and a
/// malformed primary entry counts as absent.
pub fn load_snapshot<M: ScopeMetadata + ?Sized>(
    primary: &M,
    central: &CentralThemes,
    scope: &Scope,
) -> Option<Snapshot> {
    load_primary(primary, scope).or_else(|| central.map(scope.kind).get(&scope.id).cloned())
}

fn load_primary<M: ScopeMetadata + ?Sized>(primary: &M, scope: &Scope) -> Option<Snapshot> {
    let subtree = match primary.read(scope) {
        Ok(subtree) => subtree?,
        Err(err) => {
            tracing::warn!(scope = %scope, %err, "failed to read scope metadata");
            return None;
        }
    };
    let raw = subtree.get(THEME_DATA_KEY)?.clone();
    match serde_json::from_value(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            tracing::warn!(scope = %scope, ?err, "ignoring malformed scope snapshot");
            None
        }
    }
}

/// Remove this extension's sub-tree from every scope holding one. Every
/// removal is attempted before the report is returned.
pub fn teardown_primary<M: ScopeMetadata + ?Sized>(primary: &mut M) -> TeardownReport {
    let scopes = match primary.scopes_with_data() {
        Ok(scopes) => scopes,
        Err(err) => {
            tracing::warn!(%err, "failed to list scopes holding metadata");
            return TeardownReport {
                removed: 0,
                failed: 1,
            };
        }
    };

    let mut report = TeardownReport::default();
    for scope in &scopes {
        match primary.remove(scope) {
            Ok(true) => report.removed += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(scope = %scope, %err, "failed to remove scope metadata");
                report.failed += 1;
            }
        }
    }
    report
}

fn encode_subtree(snapshot: &Snapshot) -> StorageResult<Value> {
    let mut subtree = serde_json::Map::new();
    subtree.insert(THEME_DATA_KEY.to_string(), serde_json::to_value(snapshot)?);
    Ok(Value::Object(subtree))
}

/// Primary tier kept in memory, keyed by scope.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadata {
    entries: BTreeMap<Scope, Value>,
    unavailable: Vec<Scope>,
}

impl MemoryMetadata {
    pub fn insert_raw(&mut self, scope: Scope, subtree: Value) {
        self.entries.insert(scope, subtree);
    }

    pub fn raw(&self, scope: &Scope) -> Option<&Value> {
        self.entries.get(scope)
    }

    /// Make every later call touching `scope` fail.
    pub fn mark_unavailable(&mut self, scope: Scope) {
        self.unavailable.push(scope);
    }

    fn check(&self, scope: &Scope) -> StorageResult<()> {
        if self.unavailable.contains(scope) {
            return Err(StorageError::Unavailable(scope.clone()));
        }
        Ok(())
    }
}

impl ScopeMetadata for MemoryMetadata {
    fn read(&self, scope: &Scope) -> StorageResult<Option<Value>> {
        self.check(scope)?;
        Ok(self.entries.get(scope).cloned())
    }

    fn write(&mut self, scope: &Scope, subtree: Value) -> StorageResult<()> {
        if self.unavailable.contains(scope) {
            return Err(StorageError::Write {
                scope: scope.clone(),
                message: "metadata store offline".into(),
            });
        }
        self.entries.insert(scope.clone(), subtree);
        Ok(())
    }

    fn remove(&mut self, scope: &Scope) -> StorageResult<bool> {
        self.check(scope)?;
        Ok(self.entries.remove(scope).is_some())
    }

    fn scopes_with_data(&self) -> StorageResult<Vec<Scope>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dark_snapshot() -> Snapshot {
        serde_json::from_value(json!({
            "theme": { "theme": "dark" },
            "settings": {},
            "timestamp": 1000
        }))
        .unwrap()
    }

    #[test]
    fn load_returns_none_when_no_tier_has_data() {
        let mut primary = MemoryMetadata::default();
        let mut central = CentralThemes::default();
        let store = ScopeStore::new(&mut primary, &mut central);

        assert_eq!(store.load(&Scope::persona("abc")), None);
        assert!(!store.exists(&Scope::persona("abc")));
    }

    #[test]
    fn save_then_load_returns_equal_snapshot() {
        let mut primary = MemoryMetadata::default();
        let mut central = CentralThemes::default();
        let scope = Scope::persona("abc");
        let snapshot = dark_snapshot();

        let mut store = ScopeStore::new(&mut primary, &mut central);
        store.save(&scope, &snapshot);
        assert_eq!(store.load(&scope), Some(snapshot.clone()));

        assert_eq!(primary.raw(&scope).unwrap()[THEME_DATA_KEY]["timestamp"], json!(1000));
        assert_eq!(central.character_themes.get("abc"), Some(&snapshot));
    }

    #[test]
    fn load_prefers_primary_tier() {
        let mut primary = MemoryMetadata::default();
        let mut central = CentralThemes::default();
        let scope = Scope::conversation("chat-1");
        let mut stale = dark_snapshot();
        stale.timestamp = 1;
        central.chat_themes.insert("chat-1".to_string(), stale);
        primary.insert_raw(scope.clone(), json!({ "themeData": dark_snapshot() }));

        let store = ScopeStore::new(&mut primary, &mut central);
        assert_eq!(store.load(&scope).unwrap().timestamp, 1000);
    }

    #[test]
    fn load_falls_back_to_central_map_on_missing_or_malformed_primary() {
        let mut primary = MemoryMetadata::default();
        let mut central = CentralThemes::default();
        let malformed = Scope::conversation("broken");
        primary.insert_raw(malformed.clone(), json!({ "themeData": "nope" }));
        central.chat_themes.insert("broken".to_string(), dark_snapshot());
        central.chat_themes.insert("only-central".to_string(), dark_snapshot());

        let store = ScopeStore::new(&mut primary, &mut central);
        assert_eq!(store.load(&malformed), Some(dark_snapshot()));
        assert_eq!(store.load(&Scope::conversation("only-central")), Some(dark_snapshot()));
    }

    #[test]
    fn save_still_mirrors_when_primary_tier_fails() {
        let mut primary = MemoryMetadata::default();
        let scope = Scope::persona("offline");
        primary.mark_unavailable(scope.clone());
        let mut central = CentralThemes::default();

        let mut store = ScopeStore::new(&mut primary, &mut central);
        store.save(&scope, &dark_snapshot());
        assert_eq!(store.load(&scope), Some(dark_snapshot()));
        assert!(central.character_themes.contains_key("offline"));
    }

    #[test]
    fn offline_primary_tier_rejects_reads_and_writes() {
        let mut primary = MemoryMetadata::default();
        let scope = Scope::conversation("offline");
        primary.mark_unavailable(scope.clone());

        assert!(matches!(primary.read(&scope), Err(StorageError::Unavailable(_))));
        assert!(matches!(
            primary.write(&scope, json!({})),
            Err(StorageError::Write { scope: failed, .. }) if failed == scope
        ));
        assert!(primary.raw(&scope).is_none());
    }

    #[test]
    fn delete_reports_tiers_and_nothing_to_delete() {
        let mut primary = MemoryMetadata::default();
        let mut central = CentralThemes::default();
        let scope = Scope::conversation("chat-1");

        let mut store = ScopeStore::new(&mut primary, &mut central);
        assert_eq!(store.delete(&scope), DeleteOutcome::NothingToDelete);

        store.save(&scope, &dark_snapshot());
        assert_eq!(
            store.delete(&scope),
            DeleteOutcome::Removed {
                primary: true,
                secondary: true
            }
        );
        assert_eq!(store.load(&scope), None);
    }

    #[test]
    fn teardown_attempts_every_scope_and_counts_failures() {
        let mut primary = MemoryMetadata::default();
        primary.insert_raw(Scope::conversation("a"), json!({}));
        primary.insert_raw(Scope::persona("b"), json!({}));
        primary.insert_raw(Scope::persona("c"), json!({}));
        primary.mark_unavailable(Scope::persona("b"));

        let report = teardown_primary(&mut primary);

        assert_eq!(report, TeardownReport { removed: 2, failed: 1 });
        assert!(primary.raw(&Scope::persona("b")).is_some());
        assert!(primary.raw(&Scope::persona("c")).is_none());
    }

    #[test]
    fn scope_kind_uses_host_tags_on_the_wire() {
        assert_eq!(serde_json::to_value(ScopeKind::Conversation).unwrap(), json!("chat"));
        assert_eq!(serde_json::to_value(ScopeKind::Persona).unwrap(), json!("character"));
        assert_eq!(Scope::persona("abc").to_string(), "persona:abc");
    }
}
