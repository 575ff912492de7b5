//! Error types for the pRPC protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when the server omits one.
const UNKNOWN_ERROR: &str = "unknown error";

/// The `error` object of a failed `Batch` sub-response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// gRPC status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Human-readable message.
    #[serde(default = "unknown_error")]
    pub message: String,
}

fn unknown_error() -> String {
    UNKNOWN_ERROR.to_string()
}

impl ErrorPayload {
    /// Read an error object leniently: a missing message becomes
    /// "unknown error" and a non-integer code is dropped.
    pub fn from_value(value: &Value) -> Self {
        Self {
            code: value.get("code").and_then(Value::as_i64),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(unknown_error),
        }
    }
}

/// A logical failure reported for one method call.
///
/// Carries the method name, the server's message and status code, and the
/// request payload that triggered it so callers can dump it for debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub method: String,
    pub message: String,
    pub code: Option<i64>,
    pub request_body: Option<Value>,
}

impl RpcError {
    /// Create a new error with no code and no request body.
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
            code: None,
            request_body: None,
        }
    }

    /// Build from a sub-response error object.
    ///
    /// `method` is the wire method name of the sub-request (`getBuild`); the
    /// reported method has its first letter upper-cased (`GetBuild`).
    pub fn from_payload(method: &str, payload: &ErrorPayload, request_body: Option<Value>) -> Self {
        Self {
            method: capitalize_method(method),
            message: payload.message.clone(),
            code: payload.code,
            request_body,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_request_body(mut self, request_body: Value) -> Self {
        self.request_body = Some(request_body);
        self
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.message)?;
        match self.code {
            Some(code) if code != 0 => write!(f, " (code: {})", code),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for RpcError {}

/// Upper-case the first character and leave the rest alone.
///
/// Unlike a general title-casing rule this never lowercases the tail, so
/// `searchBuilds` becomes `SearchBuilds`.
pub fn capitalize_method(method: &str) -> String {
    let mut chars = method.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
