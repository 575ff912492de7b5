//! pRPC Envelope
//!
//! A pRPC server handles `POST /prpc/<service>/<Method>` with a JSON body and
//! replies with a JSON body that may start with an anti-hijacking prefix.
//!
//! `Batch` wraps several calls in one request:
//!
//! ```text
//! {"requests": [{"getBuild": {...}}, {"searchBuilds": {...}}]}
//! {"responses": [{"getBuild": {...}}, {"error": {"code": 5, "message": "..."}}]}
//! ```
//!
//! Responses are positionally aligned with requests.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::PRPC_NAMESPACE;

/// Bytes prepended to JSON responses so they cannot be evaluated as script.
pub const RESPONSE_PREFIX: &[u8] = b")]}'";

/// Media type for both request and response bodies.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Request field holding the page size.
pub const PAGE_SIZE_FIELD: &str = "pageSize";

/// Request field holding the cursor returned by the previous page.
pub const PAGE_TOKEN_FIELD: &str = "pageToken";

/// Response field holding the cursor for the next page.
pub const NEXT_PAGE_TOKEN_FIELD: &str = "nextPageToken";

/// Sub-response field marking a per-item failure.
pub const ERROR_FIELD: &str = "error";

/// Path of a method endpoint: `/prpc/<service>/<method>`.
pub fn method_path(service: &str, method: &str) -> String {
    format!("/{}/{}/{}", PRPC_NAMESPACE, service, method)
}

/// Serialize a request payload as compact JSON.
pub fn encode_request(payload: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(payload)
}

/// Remove the anti-hijacking prefix if present.
pub fn strip_response_prefix(body: &[u8]) -> &[u8] {
    body.strip_prefix(RESPONSE_PREFIX).unwrap_or(body)
}

/// Decode a successful response body.
pub fn decode_response(body: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(strip_response_prefix(body))
}

/// Python-style truthiness for JSON values.
///
/// Servers omit or null out fields they have no value for, and proto3 JSON
/// renders defaults as empty strings, zero or empty objects. All of those
/// count as "absent".
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Body of a `Batch` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<Map<String, Value>>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `{<method>: <payload>}` entry.
    pub fn push(&mut self, method: impl Into<String>, payload: Value) {
        let mut entry = Map::new();
        entry.insert(method.into(), payload);
        self.requests.push(entry);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn to_value(&self) -> Value {
        json!(self)
    }
}

/// Body of a `Batch` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default, deserialize_with = "array_or_empty")]
    pub responses: Vec<Value>,
}

impl BatchResponse {
    /// Read a decoded response leniently; anything without a `responses`
    /// array yields no sub-responses.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// A JSON array, with `null` or any other shape read as empty.
fn array_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(values) => Ok(values),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_path() {
        assert_eq!(
            method_path("buildbucket.v2.Builds", "GetBuild"),
            "/prpc/buildbucket.v2.Builds/GetBuild"
        );
    }

    #[test]
    fn test_encode_is_compact() {
        let body = encode_request(&json!({"predicate": {"builder": {"builder": "linux-rel"}}, "pageSize": 5}))
            .unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"predicate":{"builder":{"builder":"linux-rel"}},"pageSize":5}"#
        );
    }

    #[test]
    fn test_decode_with_and_without_prefix() {
        let raw = br#"{"id":"1","number":7}"#;
        let mut prefixed = RESPONSE_PREFIX.to_vec();
        prefixed.extend_from_slice(b"\n");
        prefixed.extend_from_slice(raw);

        let plain = decode_response(raw).unwrap();
        let stripped = decode_response(&prefixed).unwrap();
        assert_eq!(plain, stripped);
        assert_eq!(plain["number"], 7);
    }

    #[test]
    fn test_prefix_only_stripped_at_start() {
        let body = br#"{"text":")]}'"}"#;
        assert_eq!(strip_response_prefix(body), body);
        assert_eq!(decode_response(body).unwrap()["text"], ")]}'");
    }

    #[test]
    fn test_is_present() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!("")));
        assert!(!is_present(&json!({})));
        assert!(!is_present(&json!(0)));
        assert!(is_present(&json!("token")));
        assert!(is_present(&json!({"code": 5})));
    }

    #[test]
    fn test_batch_request_order() {
        let mut batch = BatchRequest::new();
        batch.push("getBuild", json!({"id": "1"}));
        batch.push("searchBuilds", json!({"predicate": {}}));

        assert_eq!(batch.len(), 2);
        assert_eq!(
            serde_json::to_string(&batch.to_value()).unwrap(),
            r#"{"requests":[{"getBuild":{"id":"1"}},{"searchBuilds":{"predicate":{}}}]}"#
        );
    }

    #[test]
    fn test_batch_response_lenient() {
        let parsed = BatchResponse::from_value(json!({"responses": [{"getBuild": {}}]}));
        assert_eq!(parsed.responses.len(), 1);

        assert!(BatchResponse::from_value(json!({})).responses.is_empty());
        assert!(BatchResponse::from_value(json!([1, 2])).responses.is_empty());
        assert!(BatchResponse::from_value(json!({"responses": null})).responses.is_empty());
        assert!(BatchResponse::from_value(json!({"responses": {"getBuild": {}}})).responses.is_empty());
    }

    #[test]
    fn test_batch_envelopes_through_serde() {
        let mut batch = BatchRequest::new();
        batch.push("getBuild", json!({"id": "1"}));
        assert_eq!(serde_json::to_value(&batch).unwrap(), batch.to_value());

        let parsed: BatchRequest = serde_json::from_value(batch.to_value()).unwrap();
        assert_eq!(parsed, batch);

        let response: BatchResponse =
            serde_json::from_str(r#"{"responses": [{"error": {"code": 5}}], "extra": 1}"#).unwrap();
        assert_eq!(response.responses, vec![json!({"error": {"code": 5}})]);
    }
}
