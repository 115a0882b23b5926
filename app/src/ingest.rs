//! Routes channel deliveries: notifications to the presentation queue,
//! channel-down signals to the supervisor.

use std::collections::{HashSet, VecDeque};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channel::Delivery;
use crate::notification::QueueHandle;
use crate::supervisor::SupervisorHandle;

/// How many recent event ids are remembered for duplicate suppression.
const SEEN_CAPACITY: usize = 256;

/// Bounded memory of recently delivered event ids.
#[derive(Debug)]
pub struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `id`; returns false if it was already known.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }
}

impl Default for SeenIds {
    fn default() -> Self {
        Self::new(SEEN_CAPACITY)
    }
}

pub async fn run(
    mut rx: mpsc::Receiver<Delivery>,
    queue: QueueHandle,
    supervisor: SupervisorHandle,
    shutdown: CancellationToken,
) {
    let mut seen = SeenIds::default();
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = rx.recv() => match delivery {
                Some(d) => d,
                None => break,
            },
        };

        match delivery {
            Delivery::Notification(event) => {
                if !seen.insert(&event.id) {
                    tracing::debug!(id = %event.id, "Dropping duplicate notification");
                    continue;
                }
                if let Err(e) = queue.show(event).await {
                    tracing::warn!(error = %e, "Notification dropped");
                }
            }
            Delivery::ChannelDown(reason) => {
                if let Err(e) = supervisor.channel_down(reason).await {
                    tracing::warn!(error = %e, "Channel-down signal dropped");
                }
            }
        }
    }
    tracing::info!("Delivery ingest stopped");
}
