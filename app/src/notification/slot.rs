//! Single-slot display state.
//!
//! At most one event is held. Each held event carries exactly one deadline:
//! the end of its visible phase, or the end of its exit phase.

use notify_client::NotificationEvent;
use tokio::time::Instant;

use super::types::{DisplayChange, DisplayPhase, DisplaySnapshot, QueueTimings};

#[derive(Debug)]
struct Held {
    event: NotificationEvent,
    phase: DisplayPhase,
    deadline: Instant,
}

impl Held {
    fn begin_exit(&mut self, deadline: Instant) -> DisplayChange {
        self.phase = DisplayPhase::Exiting;
        self.deadline = deadline;
        DisplayChange::Exiting {
            id: self.event.id.clone(),
        }
    }
}

#[derive(Debug)]
pub struct DisplaySlot {
    timings: QueueTimings,
    held: Option<Held>,
}

impl DisplaySlot {
    pub fn new(timings: QueueTimings) -> Self {
        Self {
            timings,
            held: None,
        }
    }

    /// Replace whatever is held, in any phase, and restart the visible timer.
    pub fn show(&mut self, event: NotificationEvent, now: Instant) -> DisplayChange {
        if let Some(previous) = &self.held {
            tracing::debug!(
                previous = %previous.event.id,
                next = %event.id,
                "Replacing displayed notification"
            );
        }
        self.held = Some(Held {
            event: event.clone(),
            phase: DisplayPhase::Shown,
            deadline: now + self.timings.display_duration,
        });
        DisplayChange::Shown(event)
    }

    /// Early dismissal. Only a visible event moves; an empty slot or one
    /// already exiting keeps its current deadline.
    pub fn close(&mut self, now: Instant) -> Option<DisplayChange> {
        let held = self.held.as_mut()?;
        if held.phase != DisplayPhase::Shown {
            return None;
        }
        Some(held.begin_exit(now + self.timings.exit_duration))
    }

    /// Advance the phase whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<DisplayChange> {
        let held = self.held.as_mut()?;
        if now < held.deadline {
            return None;
        }
        match held.phase {
            DisplayPhase::Shown => Some(held.begin_exit(now + self.timings.exit_duration)),
            DisplayPhase::Exiting => {
                self.held = None;
                Some(DisplayChange::Cleared)
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.held.as_ref().map(|held| held.deadline)
    }

    pub fn phase(&self) -> Option<DisplayPhase> {
        self.held.as_ref().map(|held| held.phase)
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        match &self.held {
            Some(held) => DisplaySnapshot {
                current: Some(held.event.clone()),
                exiting: held.phase == DisplayPhase::Exiting,
            },
            None => DisplaySnapshot::default(),
        }
    }
}
