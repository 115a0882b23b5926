//! Live notification stream reader.

use std::pin::Pin;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};

use crate::model::NotificationEvent;
use crate::{ClientError, Result, SSE_EVENT_ERROR, SSE_EVENT_NOTIFICATION};

type SseEvents =
    Pin<Box<dyn Stream<Item = std::result::Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// An item read from the live stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Notification(NotificationEvent),
    /// The source reported a stream-side problem (e.g. the subscriber lagged).
    SourceError(String),
    /// A `notification` frame whose payload could not be decoded.
    Malformed(String),
    /// A frame with an event name this client does not handle.
    Other { event: String },
}

/// An open SSE response.
pub struct EventStream {
    events: SseEvents,
}

impl EventStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        Self {
            events: Box::pin(response.bytes_stream().eventsource()),
        }
    }

    /// Read the next item. `Ok(None)` means the source closed the stream.
    pub async fn next_item(&mut self) -> Result<Option<StreamItem>> {
        match self.events.next().await {
            Some(Ok(event)) => Ok(Some(classify(event))),
            Some(Err(EventStreamError::Transport(e))) => Err(ClientError::Http(e)),
            Some(Err(e)) => Err(ClientError::Stream(e.to_string())),
            None => Ok(None),
        }
    }
}

fn classify(event: Event) -> StreamItem {
    match event.event.as_str() {
        SSE_EVENT_NOTIFICATION => match serde_json::from_str(&event.data) {
            Ok(notification) => StreamItem::Notification(notification),
            Err(e) => StreamItem::Malformed(e.to_string()),
        },
        SSE_EVENT_ERROR => StreamItem::SourceError(event.data),
        _ => StreamItem::Other { event: event.event },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> Event {
        Event {
            event: event.into(),
            data: data.into(),
            id: String::new(),
            retry: None,
        }
    }

    #[test]
    fn notification_frame_decodes_event() {
        let item = classify(frame(
            "notification",
            r#"{"id":"1","event_type":"notification","title":"Break time","message":"Stretch","timestamp":"2026-10-15T09:30:00Z"}"#,
        ));
        match item {
            StreamItem::Notification(event) => {
                assert_eq!(event.title, "Break time");
                assert_eq!(event.message, "Stretch");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn bad_payload_is_malformed_not_fatal() {
        assert!(matches!(
            classify(frame("notification", "{not json")),
            StreamItem::Malformed(_)
        ));
    }

    #[test]
    fn error_frame_is_source_error() {
        assert_eq!(
            classify(frame("error", "Stream error")),
            StreamItem::SourceError("Stream error".into())
        );
    }

    #[test]
    fn unknown_event_is_passed_through() {
        assert_eq!(
            classify(frame("message", "hi")),
            StreamItem::Other {
                event: "message".into()
            }
        );
    }

    #[tokio::test]
    async fn frames_split_across_chunks_are_reassembled() {
        let chunks: Vec<std::result::Result<&'static [u8], std::convert::Infallible>> = vec![
            Ok(&b": keep-alive\n\nevent: notif"[..]),
            Ok(&b"ication\r\ndata: {\"id\":\"7\",\"title\":\"Break time\",\"message\":\"Stretch\",\"timestamp\":\"2026-10-15T09:30:00Z\"}\r\n\r\n"[..]),
            Ok(&b"event: error\ndata: lagged by 3 events\n\n"[..]),
        ];
        let items: Vec<StreamItem> = futures::stream::iter(chunks)
            .eventsource()
            .filter_map(|event| async move { event.ok().map(classify) })
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        match &items[0] {
            StreamItem::Notification(event) => {
                assert_eq!(event.id, "7");
                assert_eq!(event.event_type, "notification");
            }
            other => panic!("unexpected item: {other:?}"),
        }
        assert_eq!(
            items[1],
            StreamItem::SourceError("lagged by 3 events".into())
        );
    }
}
