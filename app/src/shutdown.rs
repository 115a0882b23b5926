use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::app::SharedState;

/// Upper bound on waiting for the supervisor to stop the live channel.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on each remaining bridge step.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Long-running tasks the shutdown sequence waits on, in order.
pub struct BackgroundTasks {
    pub supervisor: JoinHandle<()>,
    pub queue: JoinHandle<()>,
    /// Ends once the supervisor has published its final state.
    pub connection_events: JoinHandle<()>,
    pub writer: JoinHandle<()>,
    /// Stops the output writer; cancelled last.
    pub writer_stop: CancellationToken,
}

pub async fn graceful_shutdown(state: &SharedState, tasks: BackgroundTasks) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    match timeout(STOP_TIMEOUT, tasks.supervisor).await {
        Ok(Ok(())) => tracing::info!("Shutdown: channel supervisor stopped"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Shutdown: channel supervisor task failed"),
        Err(_) => tracing::warn!("Shutdown: timed out waiting for channel supervisor"),
    }

    if let Err(e) = tasks.queue.await {
        tracing::warn!(error = %e, "Shutdown: notification queue task failed");
    } else {
        tracing::info!("Shutdown: notification queue closed");
    }

    if timeout(DRAIN_TIMEOUT, tasks.connection_events).await.is_err() {
        tracing::warn!("Shutdown: connection state forwarder did not finish");
    }

    tasks.writer_stop.cancel();
    match timeout(DRAIN_TIMEOUT, tasks.writer).await {
        Ok(_) => tracing::info!("Shutdown: event output flushed"),
        Err(_) => tracing::warn!("Shutdown: timed out flushing event output"),
    }

    tracing::info!("Shutdown sequence completed");
}
