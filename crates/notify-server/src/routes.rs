use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use notify_client::model::DEFAULT_EVENT_TYPE;
use notify_client::{
    HEALTH_PATH, NotificationEvent, POLL_PATH, SSE_EVENT_ERROR, SSE_EVENT_NOTIFICATION,
    STREAM_PATH,
};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::broadcaster::EventBroadcaster;

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<EventBroadcaster>,
    pub keepalive: Duration,
    /// Ends open SSE streams so graceful shutdown can complete.
    pub shutdown: CancellationToken,
}

/// Create the axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(STREAM_PATH, get(sse_handler))
        .route(POLL_PATH, get(poll_events))
        .route("/api/events", post(create_event))
        .route(HEALTH_PATH, get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Live SSE endpoint.
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    tracing::info!("SSE subscriber connected");
    let stream = BroadcastStream::new(rx)
        .map(|result| Ok(to_sse_event(result)))
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keepalive)
            .text("keep-alive"),
    )
}

fn to_sse_event(result: Result<NotificationEvent, BroadcastStreamRecvError>) -> Event {
    match result {
        Ok(event) => Event::default()
            .event(SSE_EVENT_NOTIFICATION)
            .json_data(&event)
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to encode notification");
                Event::default().event(SSE_EVENT_ERROR).data("encode error")
            }),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged");
            Event::default()
                .event(SSE_EVENT_ERROR)
                .data(format!("lagged by {skipped} events"))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub since: Option<String>,
    /// Id of the newest event the caller already has.
    #[serde(default)]
    pub after: Option<String>,
}

/// Polling endpoint: recent events, for clients catching up after an outage.
pub async fn poll_events(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<Vec<NotificationEvent>>, (StatusCode, String)> {
    let since = match query.since.as_deref() {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid since: {e}")))?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    Ok(Json(state.broadcaster.recent(since, query.after.as_deref())))
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    #[serde(default = "default_event_type")]
    pub event_type: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_event_type() -> String {
    DEFAULT_EVENT_TYPE.to_string()
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<CreateEventRequest>,
) -> (StatusCode, Json<NotificationEvent>) {
    let event = NotificationEvent::with_timestamp(
        payload.event_type,
        payload.title,
        payload.message,
        NotificationEvent::parse_timestamp(payload.timestamp.as_deref()),
    );

    let reached = state.broadcaster.publish(event.clone());
    tracing::info!(id = %event.id, title = %event.title, reached, "Event created");

    (StatusCode::CREATED, Json(event))
}

pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
