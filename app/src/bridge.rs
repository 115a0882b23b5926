//! Process bridge to the presentation layer.
//!
//! Display and connection changes go out on stdout as JSON lines. Line
//! commands come in on stdin; EOF on stdin requests shutdown.

use std::str::FromStr;

use notify_client::NotificationEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::app::SharedState;
use crate::events::{self, ConnectionStatePayload, ExitingPayload, StatusPayload};
use crate::notification::DisplayChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    Dismiss,
    Connect,
    Disconnect,
    Reconnect,
    Status,
    Test,
}

impl FromStr for BridgeCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dismiss" | "close" => Ok(Self::Dismiss),
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "reconnect" => Ok(Self::Reconnect),
            "status" => Ok(Self::Status),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// Mirror queue transitions as presentation events.
pub async fn forward_display_changes(state: SharedState) {
    let mut changes = state.queue().subscribe_changes();
    let shutdown = state.shutdown_token().clone();
    loop {
        let change = tokio::select! {
            _ = shutdown.cancelled() => break,
            change = changes.recv() => change,
        };
        match change {
            Ok(DisplayChange::Shown(event)) => state.emit_event(events::NOTIFICATION_SHOWN, event),
            Ok(DisplayChange::Exiting { id }) => {
                state.emit_event(events::NOTIFICATION_EXITING, ExitingPayload { id })
            }
            Ok(DisplayChange::Cleared) => state.emit_event(events::NOTIFICATION_CLEARED, ()),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display change listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Mirror supervisor state changes as presentation events.
///
/// Runs until the supervisor itself has stopped, so the final `disconnected`
/// published during shutdown is still forwarded.
pub async fn forward_connection_state(state: SharedState) {
    let mut status = state.supervisor().subscribe();
    let mut last = status.borrow_and_update().state;
    state.emit_event(
        events::CONNECTION_STATE_CHANGED,
        ConnectionStatePayload { state: last },
    );
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().state;
        if current != last {
            last = current;
            state.emit_event(
                events::CONNECTION_STATE_CHANGED,
                ConnectionStatePayload { state: current },
            );
        }
    }
}

/// Write every emitted event line to `out` until `stop` is cancelled.
///
/// `stop` is separate from the app shutdown token so events emitted while
/// shutting down still go out.
pub async fn write_events<W>(state: SharedState, mut out: W, stop: CancellationToken)
where
    W: AsyncWrite + Unpin,
{
    let mut lines = state.subscribe_events();
    loop {
        let line = tokio::select! {
            _ = stop.cancelled() => break,
            line = lines.recv() => line,
        };
        match line {
            Ok(line) => {
                if let Err(e) = write_line(&mut out, &line).await {
                    tracing::error!(error = %e, "Failed to write event line");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event writer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    // whatever is still buffered
    while let Ok(line) = lines.try_recv() {
        if write_line(&mut out, &line).await.is_err() {
            break;
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Read line commands from `input`. EOF cancels the shutdown token.
pub async fn read_commands<R>(state: SharedState, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let shutdown = state.shutdown_token().clone();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match line.parse::<BridgeCommand>() {
                Ok(command) => dispatch(&state, command).await,
                Err(e) => tracing::warn!(error = %e, "Ignoring command"),
            },
            Ok(None) => {
                tracing::info!("Command input closed, shutting down");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read command input");
                break;
            }
        }
    }
    shutdown.cancel();
}

pub async fn read_stdin_commands(state: SharedState) {
    read_commands(state, BufReader::new(tokio::io::stdin())).await;
}

pub async fn write_stdout_events(state: SharedState, stop: CancellationToken) {
    write_events(state, tokio::io::stdout(), stop).await;
}

async fn dispatch(state: &SharedState, command: BridgeCommand) {
    tracing::debug!(?command, "Bridge command");
    let supervisor = state.supervisor();
    let result = match command {
        BridgeCommand::Dismiss => state.queue().dismiss().await.map_err(anyhow::Error::from),
        BridgeCommand::Connect => supervisor.connect().await.map_err(anyhow::Error::from),
        BridgeCommand::Disconnect => supervisor.disconnect().await.map_err(anyhow::Error::from),
        BridgeCommand::Reconnect => supervisor.reconnect().await.map_err(anyhow::Error::from),
        BridgeCommand::Status => {
            let payload = StatusPayload::new(&supervisor.status(), &state.queue().snapshot());
            state.emit_event(events::STATUS, payload);
            Ok(())
        }
        BridgeCommand::Test => {
            let event = NotificationEvent::new(
                "test",
                "Test notification",
                "Notifications are working.",
            );
            state.queue().show(event).await.map_err(anyhow::Error::from)
        }
    };
    if let Err(e) = result {
        tracing::warn!(?command, error = %e, "Bridge command failed");
    }
}
