//! Transport Layer for the pRPC Client
//!
//! Abstracts the HTTP POST for testability. Provides:
//! - Transport trait: one blocking POST, returns status and body
//! - HttpTransport: reqwest blocking client for production
//! - MockTransport: routes to the in-process MockServer and records requests

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use url::Url;

use crate::config::HttpConfig;
use crate::mock::MockServer;

/// A fully-built POST request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Look up a header value, ignoring case in the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Last path segment of the URL, which is the method name.
    pub fn method(&self) -> Option<&str> {
        self.url.path_segments().and_then(|mut segments| segments.next_back())
    }
}

/// Status code and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text, for diagnostics.
    pub fn body_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport trait for pRPC communication.
///
/// Implementations own all timeout and connection policy; the client never
/// retries.
pub trait Transport: Send + Sync {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP client error: {0}")]
    Http(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Http(err)
        }
    }
}

/// Blocking HTTPS transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport with the configured timeout and user agent.
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body.clone()).send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// Mock transport for testing - serves requests from an in-process MockServer
pub struct MockTransport {
    server: MockServer,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a new mock transport with an empty mock server
    pub fn new() -> Self {
        Self::with_server(MockServer::new())
    }

    /// Create a mock transport around a pre-configured server
    pub fn with_server(server: MockServer) -> Self {
        Self {
            server,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The underlying server, for seeding data and injecting failures
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Every request posted so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests posted to `method`
    pub fn call_count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.method() == Some(method))
            .count()
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.server.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(path: &str, body: &str) -> HttpRequest {
        HttpRequest {
            url: Url::parse(&format!("https://cr-buildbucket.appspot.com{}", path)).unwrap(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "Bearer token".to_string()),
            ],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = make_request("/prpc/buildbucket.v2.Builds/GetBuild", "{}");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer token"));
        assert_eq!(request.header("Accept"), None);
    }

    #[test]
    fn test_request_method() {
        let request = make_request("/prpc/buildbucket.v2.Builds/SearchBuilds", "{}");
        assert_eq!(request.method(), Some("SearchBuilds"));
    }

    #[test]
    fn test_mock_transport_records_requests() {
        let transport = MockTransport::new();
        let request = make_request("/prpc/buildbucket.v2.Builds/SearchBuilds", r#"{"predicate":{}}"#);

        let response = transport.post(&request).unwrap();
        assert!(response.is_ok());
        assert_eq!(transport.call_count("SearchBuilds"), 1);
        assert_eq!(transport.call_count("GetBuild"), 0);
        assert_eq!(transport.last_request(), Some(request));
    }

    #[test]
    fn test_http_transport_builds_from_config() {
        let transport = HttpTransport::new(&HttpConfig::default());
        assert!(transport.is_ok());
    }
}
