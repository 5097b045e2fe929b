//! Auto-slot, bulk teardown, and export/import actions.

use super::ThemeSync;
use crate::error::{AppError, AppResult};
use crate::host::Host;
use crate::mask::SelectionMask;
use crate::notification::{NoticeLevel, Notifier};
use crate::settings::SettingsPersistence;
use crate::snapshot::{now_millis, ApplyReport, Snapshot};
use crate::storage::{teardown_primary, Scope, ScopeKind, ScopeMetadata, ScopeStore, TeardownReport};
use crate::transfer::{self, ImportMode, ScopeExport, SettingsExport};

impl<H, M, P, N> ThemeSync<H, M, P, N>
where
    H: Host,
    M: ScopeMetadata,
    P: SettingsPersistence,
    N: Notifier,
{
    /// Capture the current look into the auto-slot, replacing its content.
    pub fn save_to_auto_slot(&mut self) -> Snapshot {
        let snapshot = self.capture(true, None);
        self.settings.auto_save_slot.save(snapshot.clone());
        self.persist_settings();
        self.refresh_status();
        self.notify(NoticeLevel::Success, "current look saved to the auto-slot");
        snapshot
    }

    /// Like [`Self::save_to_auto_slot`], returning what the slot held before.
    pub fn overwrite_auto_slot(&mut self) -> Option<Snapshot> {
        let snapshot = self.capture(true, None);
        let previous = self.settings.auto_save_slot.save(snapshot);
        self.persist_settings();
        self.refresh_status();
        self.notify(NoticeLevel::Success, "auto-slot overwritten");
        previous
    }

    /// Re-apply the auto-slot. The slot is kept, so this can be repeated.
    pub fn restore_from_auto_slot(&mut self) -> AppResult<ApplyReport> {
        let result = match self.settings.auto_save_slot.restore() {
            Some(snapshot) => Ok(self.applier.apply(&mut self.host, &snapshot)),
            None => Err(AppError::AutoSlotEmpty),
        };
        self.finish(result, |report| {
            format!("restored {} fields from the auto-slot", report.applied_count())
        })
    }

    pub fn delete_auto_slot(&mut self) -> bool {
        let removed = self.settings.auto_save_slot.delete();
        if removed {
            self.persist_settings();
            self.refresh_status();
            self.notify(NoticeLevel::Success, "auto-slot cleared");
        }
        removed
    }

    /// Drop every stored theme, the auto-slot and both selection masks, then
    /// strip this extension's data from every scope. Storage failures are
    /// counted, never raised.
    pub fn delete_all(&mut self) -> TeardownReport {
        self.settings.themes.clear();
        self.settings.auto_save_slot.delete();
        self.settings.default_selected_settings = SelectionMask::builtin();
        self.masks.clear_session();
        self.persist_settings();

        let report = teardown_primary(&mut self.metadata);
        tracing::info!(removed = report.removed, failed = report.failed, "deleted all stored themes");
        self.refresh_status();
        let level = if report.failed == 0 {
            NoticeLevel::Success
        } else {
            NoticeLevel::Warning
        };
        self.notify(
            level,
            format!(
                "deleted all stored themes ({} scopes cleared, {} failed)",
                report.removed, report.failed
            ),
        );
        report
    }

    pub fn export_settings(&self) -> SettingsExport {
        transfer::export_settings(&self.settings, now_millis())
    }

    /// Import a bulk export. Nothing changes unless the whole file validates.
    pub fn import_settings(&mut self, json: &str, mode: ImportMode) -> AppResult<()> {
        let result = transfer::parse_settings_export(json)
            .map(|export| {
                transfer::apply_settings_import(&mut self.settings, export.settings, mode);
                self.masks.clear_session();
                self.persist_settings();
                self.refresh_status();
            })
            .map_err(AppError::from);
        self.finish(result, |_| format!("settings imported ({mode:?})"))
    }

    pub fn export_scope(&mut self, kind: ScopeKind) -> AppResult<ScopeExport> {
        let result = self.try_export_scope(kind);
        self.finish(result, |_| format!("exported theme of the active {}", kind.label()))
    }

    /// Import a single-scope export into the active scope of the file's kind.
    pub fn import_scope(&mut self, json: &str, mode: ImportMode) -> AppResult<Scope> {
        let result = self.try_import_scope(json, mode);
        self.finish(result, |scope| format!("imported theme into {scope} ({mode:?})"))
    }

    fn try_export_scope(&self, kind: ScopeKind) -> AppResult<ScopeExport> {
        let scope = self.require_scope(kind)?;
        let snapshot = self.load_scope(&scope).ok_or(AppError::NothingSaved(kind))?;
        let name = self.host.active_scope_name(kind);
        Ok(transfer::export_scope(&scope, name, &snapshot, now_millis())?)
    }

    fn try_import_scope(&mut self, json: &str, mode: ImportMode) -> AppResult<Scope> {
        let export = transfer::parse_scope_export(json)?;
        let scope = self.require_scope(export.kind())?;
        let current = self.load_scope(&scope);
        let snapshot = export.resolve(current.as_ref(), mode)?;

        ScopeStore::new(&mut self.metadata, &mut self.settings.themes).save(&scope, &snapshot);
        self.persist_settings();
        self.refresh_status();
        tracing::info!(scope = %scope, source = export.target.id(), ?mode, "imported scope theme");
        Ok(scope)
    }
}
