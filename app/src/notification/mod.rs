//! Notification presentation queue.
//!
//! Holds at most one notification, dismisses it after a fixed visible
//! duration, and exposes an exit phase for the presentation layer to animate.

pub mod queue;
pub mod slot;
pub mod types;

pub use queue::{QueueError, QueueHandle, spawn};
pub use slot::DisplaySlot;
pub use types::{DisplayChange, DisplayPhase, DisplaySnapshot, QueueTimings};
