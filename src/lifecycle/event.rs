/// Host lifecycle notifications the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    ScopeChanged,
    ScopeCreated,
    ScopeDeleted,
    AppReady,
    SettingsLoaded,
    /// A background was forced onto the host. Applying a snapshot emits this
    /// too, so it must never trigger a restore.
    BackgroundForceSet,
}

/// What a burst of events asks the engine to do once it settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventReaction {
    pub refresh_status: bool,
    pub auto_restore: bool,
}

impl EventReaction {
    pub const fn merge(self, other: EventReaction) -> EventReaction {
        EventReaction {
            refresh_status: self.refresh_status || other.refresh_status,
            auto_restore: self.auto_restore || other.auto_restore,
        }
    }
}

impl HostEvent {
    pub const fn reaction(self) -> EventReaction {
        let auto_restore = match self {
            Self::ScopeChanged | Self::ScopeCreated | Self::AppReady | Self::SettingsLoaded => true,
            Self::ScopeDeleted | Self::BackgroundForceSet => false,
        };
        EventReaction {
            refresh_status: true,
            auto_restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_refreshes_status() {
        for event in [
            HostEvent::ScopeChanged,
            HostEvent::ScopeCreated,
            HostEvent::ScopeDeleted,
            HostEvent::AppReady,
            HostEvent::SettingsLoaded,
            HostEvent::BackgroundForceSet,
        ] {
            assert!(event.reaction().refresh_status, "{event:?}");
        }
    }

    #[test]
    fn deletion_and_forced_background_never_restore() {
        assert!(!HostEvent::ScopeDeleted.reaction().auto_restore);
        assert!(!HostEvent::BackgroundForceSet.reaction().auto_restore);
        assert!(HostEvent::ScopeChanged.reaction().auto_restore);
    }

    #[test]
    fn merged_reaction_keeps_any_requested_restore() {
        let merged = HostEvent::ScopeDeleted
            .reaction()
            .merge(HostEvent::ScopeChanged.reaction());
        assert!(merged.auto_restore);
        assert!(merged.refresh_status);
    }
}
