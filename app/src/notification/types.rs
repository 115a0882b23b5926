//! Presentation queue type definitions.

use std::time::Duration;

use notify_client::NotificationEvent;
use serde::Serialize;

pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_millis(15_000);
pub const DEFAULT_EXIT_DURATION: Duration = Duration::from_millis(300);

/// Lifecycle phase of the held notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPhase {
    Shown,
    /// Still held, but the presentation layer should run its exit transition.
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTimings {
    pub display_duration: Duration,
    pub exit_duration: Duration,
}

impl Default for QueueTimings {
    fn default() -> Self {
        Self {
            display_duration: DEFAULT_DISPLAY_DURATION,
            exit_duration: DEFAULT_EXIT_DURATION,
        }
    }
}

/// What the presentation layer can read at any instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub current: Option<NotificationEvent>,
    pub exiting: bool,
}

/// A single visible transition of the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayChange {
    Shown(NotificationEvent),
    Exiting { id: String },
    Cleared,
}
