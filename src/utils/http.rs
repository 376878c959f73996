//! HTTP transport utilities.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connector::ConnectorError;

/// Minimal response view the connectors consume
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport abstraction between the connectors and the HTTP stack.
///
/// Injecting this seam keeps the wire protocol code testable without a
/// network; see [`StubTransport`].
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    /// Issue a GET request with the given extra headers
    async fn get(&self, url: &str, headers: &[(String, String)])
        -> Result<HttpResponse, ConnectorError>;
}

/// Shared HTTP transport backed by reqwest with sensible defaults
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Arc<Client>,
}

impl ReqwestTransport {
    /// Create a new transport with the default user agent
    pub fn new() -> Self {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new transport with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client: Arc::new(client),
        }
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, ConnectorError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConnectorError::Network(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ConnectorError::Network(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

/// A stub transport for tests that replays queued responses in FIFO order
/// and records every requested URL.
#[derive(Debug, Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    /// Create a stub with no queued responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to be returned by the next unanswered request
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.into(),
        });
    }

    /// URLs requested so far, in call order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Total number of requests issued
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests whose URL contains the given fragment
    pub fn requests_matching(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<HttpResponse, ConnectorError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ConnectorError::Network("stub transport has no queued response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_replays_in_order() {
        let stub = StubTransport::new();
        stub.push_response(200, "first");
        stub.push_response(403, "second");

        let a = stub.get("http://example.com/a", &[]).await.unwrap();
        let b = stub.get("http://example.com/b", &[]).await.unwrap();

        assert_eq!(a.body, "first");
        assert!(a.is_success());
        assert_eq!(b.status, 403);
        assert!(!b.is_success());
        assert_eq!(stub.request_count(), 2);
        assert_eq!(stub.requests_matching("/a"), 1);
    }

    #[tokio::test]
    async fn test_stub_errors_when_exhausted() {
        let stub = StubTransport::new();
        let result = stub.get("http://example.com", &[]).await;
        assert!(matches!(result, Err(ConnectorError::Network(_))));
    }

    #[tokio::test]
    async fn test_reqwest_transport_sends_headers_and_reads_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pnxs")
            .match_query(mockito::Matcher::UrlEncoded(
                "q".into(),
                "any,contains,dogs".into(),
            ))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"info":{"total":0}}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let response = transport
            .get(
                &format!("{}/pnxs?q=any%2Ccontains%2Cdogs", server.url()),
                &[("Authorization".to_string(), "Bearer tok".to_string())],
            )
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, r#"{"info":{"total":0}}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_transport_surfaces_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/denied")
            .with_status(403)
            .with_body("denied")
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let response = transport
            .get(&format!("{}/denied", server.url()), &[])
            .await
            .unwrap();

        // non-success statuses come back as responses, not errors; the
        // connectors classify them
        assert_eq!(response.status, 403);
        assert_eq!(response.body, "denied");
        assert!(!response.is_success());
    }
}
