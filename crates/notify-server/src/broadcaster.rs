//! Fan-out of created events to live subscribers plus a bounded recent buffer
//! for clients that are polling while their stream is down.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use notify_client::NotificationEvent;
use tokio::sync::broadcast;

/// Capacity of the live broadcast channel before slow subscribers lag.
const BROADCAST_CAPACITY: usize = 100;

pub struct EventBroadcaster {
    tx: broadcast::Sender<NotificationEvent>,
    recent: Mutex<VecDeque<NotificationEvent>>,
    recent_capacity: usize,
}

impl EventBroadcaster {
    pub fn new(recent_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let recent_capacity = recent_capacity.max(1);
        Self {
            tx,
            recent: Mutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity,
        }
    }

    /// Record and broadcast an event. Returns the number of live subscribers reached.
    pub fn publish(&self, event: NotificationEvent) -> usize {
        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() >= self.recent_capacity {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                tracing::debug!("No live subscribers, event kept for polling only");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    /// Recent events in arrival order.
    ///
    /// `after` is an event id: only events that arrived after it are returned,
    /// or the whole buffer once it has been evicted. `since` further keeps only
    /// events stamped at or after that time.
    pub fn recent(
        &self,
        since: Option<DateTime<Utc>>,
        after: Option<&str>,
    ) -> Vec<NotificationEvent> {
        let Ok(recent) = self.recent.lock() else {
            return Vec::new();
        };
        let start = after
            .and_then(|id| recent.iter().position(|event| event.id == id))
            .map_or(0, |pos| pos + 1);
        recent
            .iter()
            .skip(start)
            .filter(|event| since.is_none_or(|since| event.timestamp >= since))
            .cloned()
            .collect()
    }
}
