//! Wires capture, storage and restore to user actions and host events.

use std::time::Instant;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::host::Host;
use crate::lifecycle::{EventReaction, HostEvent, RestoreDebouncer};
use crate::mask::{resolved_default_mask, MaskSlots, SelectionMask};
use crate::notification::{LogNotifier, Notice, NoticeLevel, Notifier};
use crate::registry::discovery::{describe_controls, FieldDescriptor};
use crate::registry::{FieldRegistry, RegistryOptions};
use crate::settings::{load_or_default, ExtensionSettings, SettingsPersistence};
use crate::snapshot::{
    now_millis, ApplyReport, CaptureOrigin, Snapshot, SnapshotApplier, SnapshotBuilder,
};
use crate::storage::{
    load_snapshot, DeleteOutcome, Detach, Scope, ScopeKind, ScopeMetadata, ScopeStore,
};

mod actions;
mod status;

pub use status::{ScopeStatus, SnapshotSummary, SyncStatus};

/// Conversation snapshots win over persona snapshots during auto-apply.
const AUTO_APPLY_ORDER: [ScopeKind; 2] = [ScopeKind::Conversation, ScopeKind::Persona];

pub struct ThemeSync<H, M, P, N = LogNotifier> {
    host: H,
    metadata: M,
    persistence: P,
    notifier: N,
    settings: ExtensionSettings,
    masks: MaskSlots,
    registry: FieldRegistry,
    applier: SnapshotApplier,
    debouncer: RestoreDebouncer,
    last_status: SyncStatus,
}

impl<H, M, P> ThemeSync<H, M, P>
where
    H: Host,
    M: ScopeMetadata,
    P: SettingsPersistence,
{
    pub fn new(host: H, metadata: M, persistence: P, config: &AppConfig) -> Self {
        Self::with_notifier(host, metadata, persistence, LogNotifier, config)
    }
}

impl<H, M, P, N> ThemeSync<H, M, P, N>
where
    H: Host,
    M: ScopeMetadata,
    P: SettingsPersistence,
    N: Notifier,
{
    pub fn with_notifier(
        host: H,
        metadata: M,
        persistence: P,
        notifier: N,
        config: &AppConfig,
    ) -> Self {
        let settings = load_or_default(&persistence);
        let registry = FieldRegistry::new(RegistryOptions {
            substring_fallback: config.substring_fallback,
        });
        let mut sync = Self {
            host,
            metadata,
            persistence,
            notifier,
            settings,
            masks: MaskSlots::default(),
            applier: SnapshotApplier::new(registry.clone()),
            registry,
            debouncer: RestoreDebouncer::new(config.restore_debounce()),
            last_status: SyncStatus::default(),
        };
        sync.refresh_status();
        tracing::info!(
            enabled = sync.settings.enabled,
            auto_apply = sync.settings.auto_apply,
            "theme sync ready"
        );
        sync
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn settings(&self) -> &ExtensionSettings {
        &self.settings
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        self.persist_settings();
    }

    pub fn set_auto_apply(&mut self, auto_apply: bool) {
        self.settings.auto_apply = auto_apply;
        self.persist_settings();
    }

    pub fn set_use_default_settings_only(&mut self, value: bool) {
        self.settings.use_default_settings_only = value;
        self.persist_settings();
    }

    /// Describe the host's configurable fields. The first call of a session
    /// also records every newly seen key in the default mask, unselected.
    pub fn open_advanced_panel(&mut self) -> Vec<FieldDescriptor> {
        let controls = self.host.discover();
        let descriptors = describe_controls(&self.registry, &self.host, &controls);
        let outcome = self.masks.extend_defaults(
            &mut self.settings.default_selected_settings,
            descriptors.iter().map(|d| d.canonical_key.as_str()),
        );
        if outcome.needs_persist() {
            self.persist_settings();
        }
        descriptors
    }

    pub fn session_selection(&self) -> Option<&SelectionMask> {
        self.masks.session()
    }

    pub fn set_session_selection(&mut self, mask: SelectionMask) {
        self.masks.set_session(mask);
    }

    pub fn clear_session_selection(&mut self) {
        self.masks.clear_session();
    }

    /// Toggle one key in the session mask, seeding it from the defaults first.
    pub fn set_field_selected(&mut self, key: &str, selected: bool) {
        let mut mask = self.session_or_default_mask();
        mask.set(key, selected);
        self.masks.set_session(mask);
    }

    /// Select or deselect every known and discovered key in the session mask.
    pub fn select_all(&mut self, selected: bool) {
        let mut mask = self.session_or_default_mask();
        let controls = self.host.discover();
        for descriptor in describe_controls(&self.registry, &self.host, &controls) {
            mask.set(descriptor.canonical_key, selected);
        }
        mask.set_all(selected);
        self.masks.set_session(mask);
    }

    /// Persist the session mask as the new default. Returns whether one was set.
    pub fn save_selection_as_default(&mut self) -> bool {
        let Some(session) = self.masks.session().cloned() else {
            return false;
        };
        self.settings.default_selected_settings = session;
        self.persist_settings();
        self.notify(NoticeLevel::Success, "current selection saved as default");
        true
    }

    pub fn reset_selection_to_defaults(&mut self) {
        self.masks.clear_session();
        self.notify(NoticeLevel::Info, "selection reset to defaults");
    }

    /// Capture the live host state. Unmasked capture is retired and always
    /// falls back to the default mask.
    pub fn capture(&self, selected_only: bool, explicit: Option<&SelectionMask>) -> Snapshot {
        let (mask, origin) = if selected_only {
            effective_selection(&self.masks, &self.settings.default_selected_settings, explicit)
        } else {
            if !self.settings.use_default_settings_only {
                tracing::debug!("unmasked capture requested; using default mask");
            }
            (
                resolved_default_mask(&self.settings.default_selected_settings),
                CaptureOrigin::Defaults,
            )
        };
        SnapshotBuilder::new(&self.registry).capture(&self.host, &mask, origin, now_millis())
    }

    /// Snapshot stored for the active scope of `kind`, if any. Callers use this
    /// to confirm before overwriting.
    pub fn existing_theme(&self, kind: ScopeKind) -> AppResult<Option<Snapshot>> {
        let scope = self.require_scope(kind)?;
        Ok(self.load_scope(&scope))
    }

    pub fn save_theme(&mut self, kind: ScopeKind) -> AppResult<Snapshot> {
        let result = self.try_save_theme(kind);
        self.finish(result, |snapshot| {
            format!(
                "saved {} theme fields to the active {}",
                snapshot.field_count(),
                kind.label()
            )
        })
    }

    pub fn load_theme(&mut self, kind: ScopeKind) -> AppResult<ApplyReport> {
        let result = self.try_load_theme(kind);
        self.finish(result, |report| {
            format!("restored {} fields from the active {}", report.applied_count(), kind.label())
        })
    }

    pub fn delete_theme(&mut self, kind: ScopeKind) -> AppResult<()> {
        let result = self.try_delete_theme(kind);
        self.finish(result, |_| format!("deleted theme of the active {}", kind.label()))
    }

    /// Restore the active conversation's snapshot, else the active persona's.
    /// Before the first restore of a session the current look is kept in the
    /// auto-slot.
    pub fn auto_apply(&mut self) -> Option<ApplyReport> {
        if !self.settings.enabled || !self.settings.auto_apply {
            tracing::debug!("auto-apply disabled; skipped");
            return None;
        }

        let target = AUTO_APPLY_ORDER
            .into_iter()
            .filter_map(|kind| self.host.active_scope(kind))
            .find_map(|scope| self.load_scope(&scope).map(|snapshot| (scope, snapshot)));
        let Some((scope, snapshot)) = target else {
            tracing::debug!("no stored theme for active scopes");
            self.refresh_status();
            return None;
        };

        let captured = {
            let Self {
                ref host,
                ref registry,
                ref masks,
                ref mut settings,
                ..
            } = *self;
            let defaults = &settings.default_selected_settings;
            settings.auto_save_slot.capture_before_auto_apply(true, || {
                let (mask, origin) = effective_selection(masks, defaults, None);
                SnapshotBuilder::new(registry).capture(host, &mask, origin, now_millis())
            })
        };
        if captured {
            self.persist_settings();
        }

        let report = self.applier.apply(&mut self.host, &snapshot);
        tracing::info!(
            scope = %scope,
            applied = report.applied_count(),
            captured,
            "auto-applied stored theme"
        );
        self.refresh_status();
        Some(report)
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            conversation: self.scope_status(ScopeKind::Conversation),
            persona: self.scope_status(ScopeKind::Persona),
            auto_slot: self.settings.auto_save_slot.get().map(SnapshotSummary::of),
        }
    }

    /// Status as of the last refresh.
    pub fn last_status(&self) -> &SyncStatus {
        &self.last_status
    }

    pub fn refresh_status(&mut self) -> &SyncStatus {
        self.last_status = self.status();
        &self.last_status
    }

    pub fn handle_event(&mut self, event: HostEvent, now: Instant) {
        self.debouncer.schedule(event, now);
    }

    /// Run the settled reaction to recent events, if one is due.
    pub fn poll_events(&mut self, now: Instant) -> Option<EventReaction> {
        let reaction = self.debouncer.poll(now)?;
        if reaction.auto_restore {
            self.auto_apply();
        }
        if reaction.refresh_status {
            self.refresh_status();
        }
        Some(reaction)
    }

    fn try_save_theme(&mut self, kind: ScopeKind) -> AppResult<Snapshot> {
        let scope = self.require_scope(kind)?;
        let snapshot = self.capture(true, None);
        ScopeStore::new(&mut self.metadata, &mut self.settings.themes).save(&scope, &snapshot);
        self.persist_settings();
        self.refresh_status();
        tracing::info!(scope = %scope, fields = snapshot.field_count(), "saved theme");
        Ok(snapshot)
    }

    fn try_load_theme(&mut self, kind: ScopeKind) -> AppResult<ApplyReport> {
        let scope = self.require_scope(kind)?;
        let snapshot = self.load_scope(&scope).ok_or(AppError::NothingSaved(kind))?;
        let report = self.applier.apply(&mut self.host, &snapshot);
        tracing::info!(scope = %scope, applied = report.applied_count(), "loaded theme");
        Ok(report)
    }

    fn try_delete_theme(&mut self, kind: ScopeKind) -> AppResult<()> {
        let scope = self.require_scope(kind)?;
        match ScopeStore::new(&mut self.metadata, &mut self.settings.themes).delete(&scope) {
            DeleteOutcome::NothingToDelete => Err(AppError::NothingToDelete(kind)),
            DeleteOutcome::Removed { secondary, .. } => {
                if secondary {
                    self.persist_settings();
                }
                self.refresh_status();
                Ok(())
            }
        }
    }

    fn require_scope(&self, kind: ScopeKind) -> AppResult<Scope> {
        self.host
            .active_scope(kind)
            .ok_or(AppError::ScopeUnavailable(kind))
    }

    fn load_scope(&self, scope: &Scope) -> Option<Snapshot> {
        load_snapshot(&self.metadata, &self.settings.themes, scope)
    }

    fn scope_status(&self, kind: ScopeKind) -> ScopeStatus {
        let active = self.host.active_scope(kind);
        let saved = active
            .as_ref()
            .and_then(|scope| self.load_scope(scope))
            .map(|snapshot| SnapshotSummary::of(&snapshot));
        ScopeStatus { active, saved }
    }

    fn session_or_default_mask(&self) -> SelectionMask {
        self.masks
            .session()
            .cloned()
            .unwrap_or_else(|| resolved_default_mask(&self.settings.default_selected_settings))
    }

    fn persist_settings(&mut self) {
        self.persistence
            .persist(&self.settings)
            .detach("persist extension settings");
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notifier.notify(Notice::new(level, message));
    }

    /// Surface the outcome of a user action as a notice.
    fn finish<T>(&mut self, result: AppResult<T>, success: impl FnOnce(&T) -> String) -> AppResult<T> {
        match &result {
            Ok(value) => {
                let message = success(value);
                self.notify(NoticeLevel::Success, message);
            }
            Err(err) => {
                tracing::warn!(%err, "action failed");
                self.notify(NoticeLevel::Error, err.to_string());
            }
        }
        result
    }
}

fn effective_selection(
    masks: &MaskSlots,
    defaults: &SelectionMask,
    explicit: Option<&SelectionMask>,
) -> (SelectionMask, CaptureOrigin) {
    let origin = match (explicit, masks.has_session()) {
        (Some(_), _) => CaptureOrigin::Explicit,
        (None, true) => CaptureOrigin::Advanced,
        (None, false) => CaptureOrigin::Defaults,
    };
    (masks.effective(explicit, defaults), origin)
}
