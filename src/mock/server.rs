//! Mock pRPC Server
//!
//! An in-process fake of the Buildbucket and ResultDB pRPC endpoints.
//! Serves `GetBuild`, `SearchBuilds`, `QueryArtifacts` and `Batch` from
//! seeded state, with per-method failure injection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use luci_rpc_protocol::envelope::{decode_response, ERROR_FIELD};
use luci_rpc_protocol::ops::names;
use luci_rpc_protocol::{capitalize_method, BATCH_METHOD};

use super::failure::{FailureConfig, FailureInjector, MockReply};
use super::state::{MockBuild, MockError, MockState};
use crate::client::transport::{HttpRequest, HttpResponse, TransportError};

/// Shared handle to the mock; clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
    options: Arc<Mutex<ServerOptions>>,
}

#[derive(Debug)]
struct ServerOptions {
    response_prefix: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            response_prefix: true,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build(&self, build: MockBuild) {
        lock(&self.state).add_build(build);
    }

    /// Attach an artifact to an invocation such as `invocations/build-1`.
    pub fn add_artifact(&self, invocation: &str, artifact: Value) {
        lock(&self.state).add_artifact(invocation, artifact);
    }

    /// Queue a canned reply for the next call to `method`.
    pub fn push_reply(&self, method: &str, reply: MockReply) {
        lock(&self.failures).push_reply(method, reply);
    }

    pub fn inject_failure(&self, method: &str, config: FailureConfig) {
        lock(&self.failures).inject(method, config);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Cap the page size regardless of what the client asks for.
    pub fn set_max_page_size(&self, size: usize) {
        lock(&self.state).max_page_size = size;
    }

    /// Toggle the `)]}'` line in front of successful responses.
    pub fn set_response_prefix(&self, enabled: bool) {
        lock(&self.options).response_prefix = enabled;
    }

    /// Serve one POST.
    pub fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = request.method().unwrap_or_default().to_string();

        if let Some(failure) = lock(&self.failures).check(&method) {
            if failure.disconnect {
                return Err(TransportError::ConnectionFailed(format!(
                    "mock connection dropped during {}",
                    method
                )));
            }
            return Ok(HttpResponse::new(failure.status, failure.body));
        }

        if let Some(reply) = lock(&self.failures).next_reply(&method) {
            return Ok(HttpResponse::new(reply.status, reply.body));
        }

        if request.header("authorization").is_none() {
            return Ok(HttpResponse::new(401, b"missing credentials".to_vec()));
        }

        let body = match decode_response(&request.body) {
            Ok(body) => body,
            Err(err) => return Ok(HttpResponse::new(400, format!("bad request body: {}", err).into_bytes())),
        };

        let result = if method == BATCH_METHOD {
            Ok(self.batch(&body))
        } else {
            self.dispatch(&method, &body)
        };

        match result {
            Ok(value) => Ok(self.success(&value)),
            Err(err) => Ok(HttpResponse::new(err.http_status(), err.message.into_bytes())),
        }
    }

    fn dispatch(&self, method: &str, request: &Value) -> Result<Value, MockError> {
        let state = lock(&self.state);
        match method {
            names::GET_BUILD => state.get_build(request),
            names::SEARCH_BUILDS => state.search_builds(request),
            names::QUERY_ARTIFACTS => state.query_artifacts(request),
            _ => Err(MockError::not_found(format!("unknown method {:?}", method))),
        }
    }

    /// Each sub-request is one single-key object; each sub-response keys its
    /// result by the same name, or carries an `error` object.
    fn batch(&self, body: &Value) -> Value {
        let requests = body
            .get("requests")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let responses = requests
            .iter()
            .map(|entry| {
                let Some((name, payload)) = entry.as_object().and_then(|obj| obj.iter().next()) else {
                    return error_entry(&MockError::invalid_argument("empty batch request"));
                };
                let result = match name.as_str() {
                    names::BATCH_GET_BUILD | names::BATCH_SEARCH_BUILDS => {
                        self.dispatch(&capitalize_method(name), payload)
                    }
                    other => Err(MockError::unimplemented(other)),
                };
                match result {
                    Ok(value) => {
                        let mut response = Map::new();
                        response.insert(name.clone(), value);
                        Value::Object(response)
                    }
                    Err(err) => error_entry(&err),
                }
            })
            .collect();

        let mut response = Map::new();
        response.insert("responses".to_string(), Value::Array(responses));
        Value::Object(response)
    }

    fn success(&self, value: &Value) -> HttpResponse {
        let reply = MockReply::json(value.clone());
        let reply = if lock(&self.options).response_prefix {
            reply
        } else {
            reply.without_prefix()
        };
        HttpResponse::new(reply.status, reply.body)
    }
}

fn error_entry(err: &MockError) -> Value {
    let mut response = Map::new();
    response.insert(ERROR_FIELD.to_string(), err.to_value());
    Value::Object(response)
}
