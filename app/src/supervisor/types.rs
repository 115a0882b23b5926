//! Supervisor vocabulary: connection states, channel capabilities, and the
//! triggers/actions exchanged between the state machine and its runtime.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;

/// The single logical delivery channel's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Polling,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by the channel capabilities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel start failed: {0}")]
    Start(String),

    #[error("channel stop failed: {0}")]
    Stop(String),

    #[error("liveness probe failed: {0}")]
    Probe(String),

    #[error("channel went down: {0}")]
    Down(String),
}

/// Capabilities the supervisor needs from the live delivery channel.
///
/// `start` and `stop` must be idempotent. `probe` checks the notification
/// source independently of whether the channel is open.
pub trait ChannelControl: Send + Sync + 'static {
    fn start(&self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn probe(&self) -> impl Future<Output = Result<bool, ChannelError>> + Send;
}

/// Read-only snapshot published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub state: ConnectionState,
    pub last_error: Option<ChannelError>,
}

/// Everything the supervisor reacts to.
///
/// Completions carry the id of the attempt, polling session, or reconnect
/// that produced them so late arrivals can be recognised as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Connect,
    Disconnect,
    Reconnect,
    StartPolling,
    ChannelDown(String),
    StartCompleted {
        attempt: u64,
        result: Result<(), ChannelError>,
    },
    StopCompleted {
        reconnect: Option<u64>,
        result: Result<(), ChannelError>,
    },
    SettleElapsed {
        reconnect: u64,
    },
    PollTick {
        session: u64,
    },
    ProbeCompleted {
        session: u64,
        result: Result<bool, ChannelError>,
    },
}

/// Side effects requested by the state machine, executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartChannel { attempt: u64 },
    StopChannel { reconnect: Option<u64> },
    ScheduleSettle { reconnect: u64, delay: Duration },
    CancelSettle { reconnect: u64 },
    StartPolling { session: u64, interval: Duration },
    CancelPolling { session: u64 },
    Probe { session: u64 },
}
