//! Client library for the notification source.
//!
//! Provides the notification wire model, the live event stream reader built
//! on `eventsource-stream`, and the health / recent-events endpoints.

pub mod client;
pub mod model;
pub mod stream;

pub use client::NotifyClient;
pub use model::NotificationEvent;
pub use stream::{EventStream, StreamItem};

/// Path of the live SSE endpoint.
pub const STREAM_PATH: &str = "/api/events/stream";
/// Path of the recent-events endpoint used to catch up after an outage.
pub const POLL_PATH: &str = "/api/events/poll";
/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// SSE event name carrying a [`NotificationEvent`] payload.
pub const SSE_EVENT_NOTIFICATION: &str = "notification";
/// SSE event name the source uses to report a stream-side error.
pub const SSE_EVENT_ERROR: &str = "error";

/// Unified error type for the notify-client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Notification source error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Event stream error: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
