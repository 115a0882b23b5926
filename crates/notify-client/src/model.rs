//! Notification wire model shared by the source and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default `event_type` when the producer does not supply one.
pub const DEFAULT_EVENT_TYPE: &str = "notification";

/// A single notification as delivered over the stream or the polling endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

fn default_event_type() -> String {
    DEFAULT_EVENT_TYPE.to_string()
}

impl NotificationEvent {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(
        event_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(event_type, title, message, Utc::now())
    }

    pub fn with_timestamp(
        event_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            title: title.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Parse an optional RFC 3339 timestamp, falling back to now when it is
    /// missing or malformed.
    pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
        raw.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}
