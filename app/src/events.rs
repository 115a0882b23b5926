//! Event names and payloads written to the presentation layer.
//!
//! Every event is one JSON object per line: `{"type": <name>, "data": <payload>}`.

use serde::Serialize;
use serde_json::{Value, json};

use crate::notification::DisplaySnapshot;
use crate::supervisor::{ConnectionState, SupervisorStatus};

// -- Event name constants --

pub const NOTIFICATION_SHOWN: &str = "notification_shown";
pub const NOTIFICATION_EXITING: &str = "notification_exiting";
pub const NOTIFICATION_CLEARED: &str = "notification_cleared";
pub const CONNECTION_STATE_CHANGED: &str = "connection_state_changed";
pub const STATUS: &str = "status";

// -- Payload types --

#[derive(Debug, Clone, Serialize)]
pub struct ExitingPayload {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatePayload {
    pub state: ConnectionState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub notification: Option<notify_client::NotificationEvent>,
    pub exiting: bool,
}

impl StatusPayload {
    pub fn new(status: &SupervisorStatus, display: &DisplaySnapshot) -> Self {
        Self {
            state: status.state,
            last_error: status.last_error.as_ref().map(ToString::to_string),
            notification: display.current.clone(),
            exiting: display.exiting,
        }
    }
}

/// Wrap a payload in the line envelope.
pub fn envelope(event: &str, data: impl Serialize) -> Value {
    let data = serde_json::to_value(data).unwrap_or_else(|e| {
        tracing::error!(event, error = %e, "Failed to encode event payload");
        Value::Null
    });
    json!({ "type": event, "data": data })
}
