use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::events;
use crate::notification::QueueHandle;
use crate::supervisor::SupervisorHandle;

const OUTBOUND_CAPACITY: usize = 256;

/// Application shared state handed to every long-running task.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Encoded event lines for the presentation layer
    out_tx: broadcast::Sender<String>,
    config: AppConfig,
    supervisor: SupervisorHandle,
    queue: QueueHandle,
    shutdown_token: CancellationToken,
}

impl SharedState {
    pub fn new(
        config: AppConfig,
        supervisor: SupervisorHandle,
        queue: QueueHandle,
        shutdown_token: CancellationToken,
    ) -> Self {
        let (out_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);

        Self {
            inner: Arc::new(SharedStateInner {
                out_tx,
                config,
                supervisor,
                queue,
                shutdown_token,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.inner.supervisor
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.inner.queue
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Send an event to the presentation layer.
    pub fn emit_event(&self, event: &str, data: impl Serialize) {
        let line = events::envelope(event, data).to_string();
        if self.inner.out_tx.send(line).is_err() {
            tracing::trace!(event, "No presentation listener attached");
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<String> {
        self.inner.out_tx.subscribe()
    }
}
