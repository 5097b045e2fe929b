//! Single global snapshot of "what things looked like before auto-apply".

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutoSlot(Option<Snapshot>);

impl AutoSlot {
    pub fn get(&self) -> Option<&Snapshot> {
        self.0.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Store `snapshot`, returning whatever the slot held before.
    pub fn save(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        self.0.replace(snapshot)
    }

    /// Reading the slot leaves it in place.
    pub fn restore(&self) -> Option<Snapshot> {
        self.0.clone()
    }

    pub fn delete(&mut self) -> bool {
        self.0.take().is_some()
    }

    /// Fill the slot right before an auto-apply, but only when it is empty and
    /// a stored theme is about to replace the current look. Returns whether the
    /// slot was written.
    pub fn capture_before_auto_apply<F>(&mut self, restore_pending: bool, capture: F) -> bool
    where
        F: FnOnce() -> Snapshot,
    {
        if !restore_pending || self.0.is_some() {
            return false;
        }
        self.0 = Some(capture());
        tracing::debug!("captured pre auto-apply state into auto-slot");
        true
    }
}
