//! HTTP client for the notification source.

use std::time::Duration;

use url::Url;

use crate::model::NotificationEvent;
use crate::stream::EventStream;
use crate::{ClientError, HEALTH_PATH, POLL_PATH, Result, STREAM_PATH};

/// Client bound to one notification source.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct NotifyClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NotifyClient {
    /// `base_url` is the origin of the source, e.g. `http://localhost:9201`.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Point-in-time health check. A non-2xx answer is "unhealthy", not an error.
    pub async fn check_health(&self) -> Result<bool> {
        let resp = self.http.get(self.endpoint(HEALTH_PATH)?).send().await?;
        let healthy = resp.status().is_success();
        tracing::trace!(status = resp.status().as_u16(), healthy, "Health check");
        Ok(healthy)
    }

    /// Open the live SSE stream. Fails unless the source answers 2xx.
    pub async fn open_stream(&self) -> Result<EventStream> {
        let url = self.endpoint(STREAM_PATH)?;
        tracing::info!(url = %url, "Opening notification stream");
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        Ok(EventStream::new(Self::ensure_success(resp).await?))
    }

    /// Fetch the source's recent events in arrival order. With `after`, only
    /// those that arrived after the event with that id; the whole buffer if
    /// the source no longer holds it.
    pub async fn fetch_recent(&self, after: Option<&str>) -> Result<Vec<NotificationEvent>> {
        let resp = self.http.get(self.recent_url(after)?).send().await?;
        let events = Self::ensure_success(resp).await?.json().await?;
        Ok(events)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn recent_url(&self, after: Option<&str>) -> Result<Url> {
        let mut url = self.endpoint(POLL_PATH)?;
        if let Some(after) = after {
            url.query_pairs_mut().append_pair("after", after);
        }
        Ok(url)
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        Err(ClientError::Status { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NotifyClient {
        NotifyClient::new("http://localhost:9201", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoints_resolve_against_origin() {
        let c = client();
        assert_eq!(
            c.endpoint(STREAM_PATH).unwrap().as_str(),
            "http://localhost:9201/api/events/stream"
        );
        assert_eq!(
            c.endpoint(HEALTH_PATH).unwrap().as_str(),
            "http://localhost:9201/health"
        );
    }

    #[test]
    fn recent_url_without_cursor_has_no_query() {
        let url = client().recent_url(None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9201/api/events/poll");
    }

    #[test]
    fn recent_url_encodes_cursor() {
        let url = client().recent_url(Some("a1 b2&c")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("after".to_string(), "a1 b2&c".to_string())]);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = NotifyClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ClientError::UrlParse(_)));
    }
}
