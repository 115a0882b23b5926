//! Presentation queue worker.
//!
//! A single task owns the [`DisplaySlot`]. Commands and timer expiries are
//! handled one at a time; the only timer is a sleep until the slot's current
//! deadline, rebuilt every iteration, so replacing an event drops the old
//! timer instead of letting it fire.

use std::future::pending;

use notify_client::NotificationEvent;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use super::slot::DisplaySlot;
use super::types::{DisplayChange, DisplaySnapshot, QueueTimings};

const COMMAND_CAPACITY: usize = 100;
const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("notification queue is not running")]
    Stopped,
}

#[derive(Debug)]
enum Command {
    Show(NotificationEvent),
    Dismiss,
}

#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<DisplaySnapshot>,
    changes: broadcast::Sender<DisplayChange>,
}

impl QueueHandle {
    /// Display `event`, replacing anything currently shown.
    pub async fn show(&self, event: NotificationEvent) -> Result<(), QueueError> {
        self.send(Command::Show(event)).await
    }

    /// User-initiated early close.
    pub async fn dismiss(&self) -> Result<(), QueueError> {
        self.send(Command::Dismiss).await
    }

    pub fn current_notification(&self) -> Option<NotificationEvent> {
        self.snapshot.borrow().current.clone()
    }

    pub fn is_exiting(&self) -> bool {
        self.snapshot.borrow().exiting
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.snapshot.clone()
    }

    /// Every transition in order, for consumers that must not miss a phase.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<DisplayChange> {
        self.changes.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), QueueError> {
        self.tx.send(command).await.map_err(|_| QueueError::Stopped)
    }
}

/// Start the queue worker.
pub fn spawn(timings: QueueTimings, shutdown: CancellationToken) -> (QueueHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(DisplaySnapshot::default());
    let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

    let task = tokio::spawn(worker_loop(
        DisplaySlot::new(timings),
        rx,
        snapshot_tx,
        changes.clone(),
        shutdown,
    ));
    tracing::info!(
        display_ms = timings.display_duration.as_millis() as u64,
        exit_ms = timings.exit_duration.as_millis() as u64,
        "Notification queue worker started"
    );

    (
        QueueHandle {
            tx,
            snapshot: snapshot_rx,
            changes,
        },
        task,
    )
}

async fn worker_loop(
    mut slot: DisplaySlot,
    mut rx: mpsc::Receiver<Command>,
    snapshot: watch::Sender<DisplaySnapshot>,
    changes: broadcast::Sender<DisplayChange>,
    shutdown: CancellationToken,
) {
    loop {
        let deadline = slot.deadline();
        let timer = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        let change = tokio::select! {
            _ = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(Command::Show(event)) => {
                    tracing::info!(id = %event.id, title = %event.title, "Showing notification");
                    Some(slot.show(event, Instant::now()))
                }
                Some(Command::Dismiss) => slot.close(Instant::now()),
                None => break,
            },
            _ = timer => slot.expire(Instant::now()),
        };

        if let Some(change) = change {
            tracing::debug!(?change, "Display changed");
            snapshot.send_replace(slot.snapshot());
            // no receivers is fine
            let _ = changes.send(change);
        }
    }

    // pending timers die with this task; the held event is left as is
    tracing::info!("Notification queue worker stopped");
}
