use std::time::{Duration, Instant};

use super::event::{EventReaction, HostEvent};

/// Coalesces bursts of host events into a single reaction that fires once
/// no new event has arrived for `delay`.
#[derive(Debug, Clone)]
pub struct RestoreDebouncer {
    delay: Duration,
    pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    reaction: EventReaction,
    due: Instant,
}

impl RestoreDebouncer {
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record `event`; every new event pushes the deadline back.
    pub fn schedule(&mut self, event: HostEvent, now: Instant) {
        let reaction = match self.pending {
            Some(pending) => pending.reaction.merge(event.reaction()),
            None => event.reaction(),
        };
        self.pending = Some(Pending {
            reaction,
            due: now + self.delay,
        });
        tracing::debug!(?event, delay = ?self.delay, "scheduled event reaction");
    }

    /// The settled reaction, once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<EventReaction> {
        let pending = self.pending?;
        if now < pending.due {
            return None;
        }
        self.pending = None;
        Some(pending.reaction)
    }
}
