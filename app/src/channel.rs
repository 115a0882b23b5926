//! SSE-backed live channel.
//!
//! `start` opens the source's event stream and hands it to a reader task.
//! The reader first catches up on events that arrived at the source while
//! the stream was down, then forwards every notification it decodes. If the
//! stream ends without `stop` having been called, the reader reports the
//! channel as down.
//!
//! Catch-up resumes from the id of the newest event delivered, so it follows
//! the source's arrival order rather than producer timestamps. The backlog
//! already at the source on the very first connect is skipped.

use std::sync::{Arc, Mutex};

use notify_client::{EventStream, NotificationEvent, NotifyClient, StreamItem};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::supervisor::{ChannelControl, ChannelError};

/// What the channel produces for the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Notification(NotificationEvent),
    /// The live stream died on its own.
    ChannelDown(String),
}

struct Reader {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Catch-up position, shared across connections.
#[derive(Debug, Default)]
struct Cursor {
    /// False until the first catch-up or delivery.
    primed: bool,
    /// Id of the newest event delivered.
    last_id: Option<String>,
}

pub struct SseChannel {
    client: NotifyClient,
    deliveries: mpsc::Sender<Delivery>,
    reader: AsyncMutex<Option<Reader>>,
    cursor: Arc<Mutex<Cursor>>,
    shutdown: CancellationToken,
}

impl SseChannel {
    pub fn new(
        client: NotifyClient,
        deliveries: mpsc::Sender<Delivery>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            deliveries,
            reader: AsyncMutex::new(None),
            cursor: Arc::new(Mutex::new(Cursor::default())),
            shutdown,
        }
    }
}

impl ChannelControl for SseChannel {
    async fn start(&self) -> Result<(), ChannelError> {
        let mut reader = self.reader.lock().await;
        if reader.as_ref().is_some_and(|r| !r.task.is_finished()) {
            tracing::debug!("Live stream already open");
            return Ok(());
        }

        let stream = self
            .client
            .open_stream()
            .await
            .map_err(|e| ChannelError::Start(e.to_string()))?;

        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(read_loop(
            self.client.clone(),
            stream,
            self.deliveries.clone(),
            cancel.clone(),
            self.cursor.clone(),
        ));
        *reader = Some(Reader { cancel, task });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        let Some(reader) = self.reader.lock().await.take() else {
            return Ok(());
        };
        reader.cancel.cancel();
        if let Err(e) = reader.task.await {
            return Err(ChannelError::Stop(e.to_string()));
        }
        tracing::info!("Live stream closed");
        Ok(())
    }

    async fn probe(&self) -> Result<bool, ChannelError> {
        self.client
            .check_health()
            .await
            .map_err(|e| ChannelError::Probe(e.to_string()))
    }
}

async fn read_loop(
    client: NotifyClient,
    mut stream: EventStream,
    tx: mpsc::Sender<Delivery>,
    cancel: CancellationToken,
    cursor: Arc<Mutex<Cursor>>,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = catch_up(&client, &tx, &cursor) => {}
    }

    let reason = loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Stream reader cancelled");
                return;
            }
            item = stream.next_item() => item,
        };

        match item {
            Ok(Some(StreamItem::Notification(event))) => {
                tracing::debug!(id = %event.id, "Notification received");
                if !forward(&tx, &cursor, event).await {
                    return;
                }
            }
            Ok(Some(StreamItem::SourceError(message))) => {
                tracing::warn!(detail = %message, "Notification source reported a stream error");
            }
            Ok(Some(StreamItem::Malformed(error))) => {
                tracing::warn!(error = %error, "Skipping malformed notification frame");
            }
            Ok(Some(StreamItem::Other { event })) => {
                tracing::debug!(event = %event, "Ignoring unknown stream event");
            }
            Ok(None) => break "stream closed by source".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    tracing::warn!(reason = %reason, "Live stream lost");
    let _ = tx.send(Delivery::ChannelDown(reason)).await;
}

/// Fetch events that arrived after the cursor. Failures are logged; the
/// stream itself is already open.
async fn catch_up(
    client: &NotifyClient,
    tx: &mpsc::Sender<Delivery>,
    cursor: &Mutex<Cursor>,
) {
    let Some((primed, after)) = cursor
        .lock()
        .ok()
        .map(|c| (c.primed, c.last_id.clone()))
    else {
        return;
    };

    let events = match client.fetch_recent(after.as_deref()).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(error = %e, "Catch-up fetch failed");
            return;
        }
    };

    if !primed {
        if let Ok(mut c) = cursor.lock() {
            if !c.primed {
                c.primed = true;
                c.last_id = events.last().map(|event| event.id.clone());
            }
        }
        tracing::info!(skipped = events.len(), "Skipping notification backlog on first connect");
        return;
    }

    if !events.is_empty() {
        tracing::info!(count = events.len(), after = ?after, "Catching up on missed notifications");
    }
    for event in events {
        if !forward(tx, cursor, event).await {
            return;
        }
    }
}

async fn forward(
    tx: &mpsc::Sender<Delivery>,
    cursor: &Mutex<Cursor>,
    event: NotificationEvent,
) -> bool {
    if let Ok(mut c) = cursor.lock() {
        c.primed = true;
        c.last_id = Some(event.id.clone());
    }
    tx.send(Delivery::Notification(event)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use notify_server::{AppState, EventBroadcaster};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    // nothing listens on the discard port
    const DEAD_SOURCE: &str = "http://127.0.0.1:9";

    fn dead_channel() -> SseChannel {
        let client = NotifyClient::new(DEAD_SOURCE, Duration::from_secs(1)).unwrap();
        let (tx, _rx) = mpsc::channel(8);
        SseChannel::new(client, tx, CancellationToken::new())
    }

    #[tokio::test]
    async fn start_against_dead_source_fails() {
        let err = dead_channel().start().await.unwrap_err();
        assert!(matches!(err, ChannelError::Start(_)));
    }

    #[tokio::test]
    async fn probe_transport_error_is_probe_failure() {
        let err = dead_channel().probe().await.unwrap_err();
        assert!(matches!(err, ChannelError::Probe(_)));
    }

    #[tokio::test]
    async fn stop_without_start_is_ok() {
        let channel = dead_channel();
        assert!(channel.stop().await.is_ok());
        assert!(channel.stop().await.is_ok());
    }

    async fn spawn_source() -> (String, Arc<EventBroadcaster>, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broadcaster = Arc::new(EventBroadcaster::new(16));
        let shutdown = CancellationToken::new();
        let state = AppState {
            broadcaster: broadcaster.clone(),
            keepalive: Duration::from_secs(15),
            shutdown: shutdown.clone(),
        };
        tokio::spawn(notify_server::serve(listener, state));
        (format!("http://{addr}"), broadcaster, shutdown)
    }

    async fn next_delivery(rx: &mut mpsc::Receiver<Delivery>) -> Delivery {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no delivery")
            .expect("delivery channel closed")
    }

    #[tokio::test]
    async fn first_connect_skips_backlog_then_streams_then_reports_loss() {
        let (url, broadcaster, server_shutdown) = spawn_source().await;
        broadcaster.publish(NotificationEvent::new("notification", "Old", "before startup"));

        let (tx, mut rx) = mpsc::channel(8);
        let client = NotifyClient::new(&url, Duration::from_secs(1)).unwrap();
        let channel = SseChannel::new(client, tx, CancellationToken::new());

        assert!(channel.probe().await.unwrap());
        channel.start().await.unwrap();
        // already open
        channel.start().await.unwrap();

        let live = NotificationEvent::new("notification", "Break time", "Stretch");
        broadcaster.publish(live.clone());
        assert_eq!(next_delivery(&mut rx).await, Delivery::Notification(live));

        server_shutdown.cancel();
        assert!(matches!(
            next_delivery(&mut rx).await,
            Delivery::ChannelDown(_)
        ));
    }

    #[tokio::test]
    async fn restart_catches_up_in_arrival_order_despite_skewed_timestamps() {
        let (url, broadcaster, server_shutdown) = spawn_source().await;
        let (tx, mut rx) = mpsc::channel(8);
        let client = NotifyClient::new(&url, Duration::from_secs(1)).unwrap();
        let channel = SseChannel::new(client, tx, CancellationToken::new());

        channel.start().await.unwrap();
        let skewed = NotificationEvent::with_timestamp(
            "notification",
            "From the future",
            "clock skew",
            chrono::Utc::now() + chrono::Duration::minutes(5),
        );
        broadcaster.publish(skewed.clone());
        assert_eq!(next_delivery(&mut rx).await, Delivery::Notification(skewed));

        channel.stop().await.unwrap();
        let missed = NotificationEvent::new("notification", "Missed", "while stopped");
        broadcaster.publish(missed.clone());

        channel.start().await.unwrap();
        assert_eq!(next_delivery(&mut rx).await, Delivery::Notification(missed));
        assert!(
            timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
            "nothing already delivered is replayed"
        );

        channel.stop().await.unwrap();
        server_shutdown.cancel();
    }

    #[tokio::test]
    async fn stop_does_not_report_channel_down() {
        let (url, _broadcaster, server_shutdown) = spawn_source().await;
        let (tx, mut rx) = mpsc::channel(8);
        let client = NotifyClient::new(&url, Duration::from_secs(1)).unwrap();
        let channel = SseChannel::new(client, tx, CancellationToken::new());

        channel.start().await.unwrap();
        channel.stop().await.unwrap();

        assert!(
            timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
            "stopped channel must stay quiet"
        );
        server_shutdown.cancel();
    }

    #[tokio::test]
    async fn forward_advances_cursor_in_delivery_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let cursor = Mutex::new(Cursor::default());
        let first = NotificationEvent::new("notification", "a", "m");
        let second = NotificationEvent::new("notification", "b", "m");

        assert!(forward(&tx, &cursor, first.clone()).await);
        assert!(forward(&tx, &cursor, second.clone()).await);

        {
            let c = cursor.lock().unwrap();
            assert!(c.primed);
            assert_eq!(c.last_id.as_deref(), Some(second.id.as_str()));
        }
        assert_eq!(rx.recv().await, Some(Delivery::Notification(first)));
        assert_eq!(rx.recv().await, Some(Delivery::Notification(second)));
    }
}
