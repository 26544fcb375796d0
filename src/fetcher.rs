//! Feed retrieval over HTTP.
//!
//! [`FeedClient`] is the seam between the orchestrator and the network: one
//! GET per source, no retries, a hard timeout, and non-2xx responses reported
//! as [`FetchError::Http`] so the status still lands in the run log. A body
//! that breaks off after a 2xx is a [`FetchError::Body`] carrying that status.

use crate::error::FetchError;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub const USER_AGENT: &str = "trend-watcher-bot/0.1 (+https://example.invalid)";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A successfully retrieved feed document.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub status: u16,
    pub body: String,
}

/// Trait for retrieving one feed document.
pub trait FeedClient {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError>;
}

/// [`FeedClient`] backed by a `reqwest` client with a whole-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    client: Client,
    timeout: Duration,
}

impl HttpFeedClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                millis: self.timeout.as_millis(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl FeedClient for HttpFeedClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body {
            status: status.as_u16(),
            reason: self.map_error(e).to_string(),
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "Fetched feed");
        Ok(FetchedFeed {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/feed.xml")
    }

    #[test]
    fn test_client_builds_with_timeout() {
        let client = HttpFeedClient::new(Duration::from_millis(1500)).unwrap();
        assert_eq!(client.timeout, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_success_returns_status_and_body() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n<rss>").await;
        let client = HttpFeedClient::new(Duration::from_secs(5)).unwrap();
        let feed = client.fetch(&url).await.unwrap();
        assert_eq!(feed.status, 200);
        assert_eq!(feed.body, "<rss>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let client = HttpFeedClient::new(Duration::from_secs(5)).unwrap();
        let err = client.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 503 }));
        assert_eq!(err.to_string(), "HTTP 503");
    }

    #[tokio::test]
    async fn test_truncated_body_keeps_received_status() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n<rss><chan").await;
        let client = HttpFeedClient::new(Duration::from_secs(5)).unwrap();
        let err = client.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Body { status: 200, .. }), "got {err:?}");
        assert_eq!(err.http_status(), Some(200));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_fetch_error() {
        let client = HttpFeedClient::new(Duration::from_secs(2)).unwrap();
        // Port 9 on localhost: connection refused (or a timeout in odd sandboxes).
        let err = client.fetch("http://127.0.0.1:9/feed.xml").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_) | FetchError::Timeout { .. }));
        assert_eq!(err.http_status(), None);
    }
}
