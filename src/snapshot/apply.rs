use std::cell::Cell;

use serde_json::Value;

use super::{Snapshot, BACKGROUND_KEY, CUSTOM_CSS_KEY, HARDCODED_THEME_KEYS, THEME_KEY};
use crate::host::{HostAccessors, HostError, HostResult, PreferenceStore};
use crate::registry::{FieldEffect, FieldRegistry, FieldTarget, SpecialKey};

/// Outcome of one apply call. Failures are collected, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    /// Set when the call arrived while another apply was still running.
    pub reentrant: bool,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    fn record(&mut self, key: &str, outcome: FieldOutcome) {
        let bucket = match outcome {
            FieldOutcome::Applied => &mut self.applied,
            FieldOutcome::Skipped => &mut self.skipped,
            FieldOutcome::Failed => &mut self.failed,
        };
        bucket.push(key.to_string());
    }
}

enum FieldOutcome {
    Applied,
    Skipped,
    Failed,
}

/// Resets the in-progress flag even when a setter panics.
struct RestoreGuard<'a>(&'a Cell<bool>);

impl<'a> RestoreGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Debug, Default)]
pub struct SnapshotApplier {
    registry: FieldRegistry,
    in_progress: Cell<bool>,
}

impl SnapshotApplier {
    pub fn new(registry: FieldRegistry) -> Self {
        Self {
            registry,
            in_progress: Cell::new(false),
        }
    }

    pub fn is_applying(&self) -> bool {
        self.in_progress.get()
    }

    /// Replay `snapshot` onto the host. Keys outside the snapshot are left
    /// untouched and repeating the call yields the same host state.
    pub fn apply<H>(&self, host: &mut H, snapshot: &Snapshot) -> ApplyReport
    where
        H: PreferenceStore + HostAccessors + ?Sized,
    {
        let Some(_guard) = RestoreGuard::enter(&self.in_progress) else {
            tracing::debug!("apply requested while another apply is running; ignored");
            return ApplyReport {
                reentrant: true,
                ..ApplyReport::default()
            };
        };

        let mut report = ApplyReport::default();
        self.apply_hardcoded(host, snapshot, &mut report);

        let generic = snapshot
            .theme
            .iter()
            .filter(|(key, _)| !HARDCODED_THEME_KEYS.contains(&key.as_str()))
            .chain(snapshot.settings.iter());
        for (key, value) in generic {
            let outcome = self.write_field(host, key, value);
            report.record(key, outcome);
        }

        host.apply_all();
        tracing::debug!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "applied snapshot"
        );
        report
    }

    fn apply_hardcoded<H>(&self, host: &mut H, snapshot: &Snapshot, report: &mut ApplyReport)
    where
        H: HostAccessors + ?Sized,
    {
        if let Some(value) = snapshot.theme.get(THEME_KEY) {
            let outcome = match value.as_str() {
                Some(name) => outcome_of(THEME_KEY, host.set_active_theme(name)),
                None => skipped(THEME_KEY, "theme name is not a string"),
            };
            report.record(THEME_KEY, outcome);
        }

        if let Some(value) = snapshot.theme.get(CUSTOM_CSS_KEY) {
            let outcome = match value.as_str() {
                Some(css) => outcome_of(CUSTOM_CSS_KEY, host.set_custom_css(css)),
                None => skipped(CUSTOM_CSS_KEY, "custom css is not a string"),
            };
            report.record(CUSTOM_CSS_KEY, outcome);
        }

        if snapshot.theme.contains_key(BACKGROUND_KEY) {
            let outcome = match snapshot.background().and_then(|bg| bg.normalized()) {
                Some(background) => outcome_of(BACKGROUND_KEY, host.set_background(&background)),
                None => skipped(BACKGROUND_KEY, "background has no usable path"),
            };
            report.record(BACKGROUND_KEY, outcome);
        }
    }

    fn write_field<H>(&self, host: &mut H, key: &str, value: &Value) -> FieldOutcome
    where
        H: PreferenceStore + HostAccessors + ?Sized,
    {
        if let Some(special) = SpecialKey::dedicated(key) {
            return outcome_of(key, host.set_special_value(special, value));
        }

        match self.registry.resolve(&*host, key) {
            Some(FieldTarget::Preference(host_key)) => {
                let result = host.set(&host_key, value.clone());
                let failed = result.is_err();
                let outcome = outcome_of(key, result);
                if !failed {
                    if let Some(effect) = FieldEffect::for_key(&host_key) {
                        host.field_applied(effect);
                    }
                }
                outcome
            }
            Some(FieldTarget::Special(special)) => outcome_of(key, host.set_special_value(special, value)),
            None => skipped(key, "no host field for key"),
        }
    }
}

fn outcome_of(key: &str, result: HostResult<()>) -> FieldOutcome {
    match result {
        Ok(()) => FieldOutcome::Applied,
        Err(err) => {
            log_field_error(key, &err);
            FieldOutcome::Failed
        }
    }
}

fn log_field_error(key: &str, err: &HostError) {
    tracing::warn!(key, %err, "failed to apply field; continuing");
}

fn skipped(key: &str, reason: &str) -> FieldOutcome {
    tracing::warn!(key, reason, "field skipped during apply");
    FieldOutcome::Skipped
}
