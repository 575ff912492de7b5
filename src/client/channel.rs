//! pRPC Channel
//!
//! One channel talks to one service on one host. A call builds the method
//! URL, attaches a bearer token and JSON headers, POSTs the compact JSON
//! payload, and decodes the response body.
//!
//! A call never fails loudly: transport errors, auth errors and non-200
//! statuses come back as [`CallOutcome::Failure`] after being logged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use luci_rpc_protocol::envelope::{self, JSON_MEDIA_TYPE};

use super::auth::{AuthError, TokenProvider};
use super::transport::{HttpRequest, Transport, TransportError};

/// Result of a single call.
#[derive(Debug)]
#[must_use]
pub enum CallOutcome {
    /// HTTP 200 and a decodable body.
    Success(Value),
    /// Anything else; the call produced no data.
    Failure(CallFailure),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// The decoded payload, or `None` on any failure.
    pub fn into_value(self) -> Option<Value> {
        match self {
            CallOutcome::Success(value) => Some(value),
            CallOutcome::Failure(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            CallOutcome::Success(value) => Some(value),
            CallOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CallFailure> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> Result<Value, CallFailure> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Failure(failure) => Err(failure),
        }
    }
}

impl From<Result<Value, CallFailure>> for CallOutcome {
    fn from(result: Result<Value, CallFailure>) -> Self {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(failure) => CallOutcome::Failure(failure),
        }
    }
}

/// Why a call produced no data.
#[derive(Debug, thiserror::Error)]
pub enum CallFailure {
    #[error("RPC request failed with HTTP status {status}")]
    Status { status: u16, body: Vec<u8> },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Could not obtain access token: {0}")]
    Auth(#[from] AuthError),

    #[error("Could not encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid response JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Invalid method URL: {0}")]
    Url(#[from] url::ParseError),
}

impl CallFailure {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CallFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authenticated channel to one pRPC service.
///
/// Cloning is cheap and clones share the method URL cache.
#[derive(Clone)]
pub struct RpcChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    host: String,
    service: String,
    urls: Mutex<HashMap<String, Url>>,
}

impl RpcChannel {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        host: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                tokens,
                host: host.into(),
                service: service.into(),
                urls: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// `https://<host>/prpc/<service>/<method>`, computed once per method.
    pub fn method_url(&self, method: &str) -> Result<Url, url::ParseError> {
        let mut urls = self.inner.urls.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(url) = urls.get(method) {
            return Ok(url.clone());
        }

        let url = Url::parse(&format!(
            "https://{}{}",
            self.inner.host,
            envelope::method_path(&self.inner.service, method)
        ))?;
        urls.insert(method.to_string(), url.clone());
        Ok(url)
    }

    /// Perform one call and decode its payload.
    pub fn call(&self, method: &str, payload: &Value) -> CallOutcome {
        self.try_call(method, payload).into()
    }

    fn try_call(&self, method: &str, payload: &Value) -> Result<Value, CallFailure> {
        let url = self.method_url(method)?;
        let token = self.inner.tokens.access_token().map_err(|err| {
            warn!(%url, error = %err, "could not obtain access token for RPC");
            err
        })?;
        let body = envelope::encode_request(payload).map_err(CallFailure::Encode)?;

        let request = HttpRequest {
            url,
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", token)),
                ("Accept".to_string(), JSON_MEDIA_TYPE.to_string()),
                ("Content-Type".to_string(), JSON_MEDIA_TYPE.to_string()),
            ],
            body,
        };

        debug!(url = %request.url, bytes = request.body.len(), "sending RPC request");
        let response = self.inner.transport.post(&request).map_err(|err| {
            warn!(url = %request.url, error = %err, "RPC transport failed");
            err
        })?;

        if !response.is_ok() {
            error!(status = response.status, url = %request.url, "RPC request failed");
            debug!(body = %response.body_lossy(), "full RPC response");
            return Err(CallFailure::Status {
                status: response.status,
                body: response.body,
            });
        }

        envelope::decode_response(&response.body).map_err(|err| {
            error!(url = %request.url, error = %err, "RPC response is not valid JSON");
            debug!(body = %response.body_lossy(), "full RPC response");
            CallFailure::Decode(err)
        })
    }
}

impl std::fmt::Debug for RpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChannel")
            .field("host", &self.inner.host)
            .field("service", &self.inner.service)
            .finish()
    }
}
