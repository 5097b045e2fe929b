use crate::snapshot::Snapshot;
use crate::storage::Scope;

/// Short description of a stored snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub theme_name: Option<String>,
    pub timestamp: i64,
    pub theme_fields: usize,
    pub setting_fields: usize,
    pub saved_with_advanced_settings: bool,
}

impl SnapshotSummary {
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            theme_name: snapshot.theme_name().map(str::to_string),
            timestamp: snapshot.timestamp,
            theme_fields: snapshot.theme.len(),
            setting_fields: snapshot.settings.len(),
            saved_with_advanced_settings: snapshot.saved_with_advanced_settings,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeStatus {
    pub active: Option<Scope>,
    pub saved: Option<SnapshotSummary>,
}

impl ScopeStatus {
    pub fn has_saved_theme(&self) -> bool {
        self.saved.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub conversation: ScopeStatus,
    pub persona: ScopeStatus,
    pub auto_slot: Option<SnapshotSummary>,
}
