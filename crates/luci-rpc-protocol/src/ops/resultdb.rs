//! ResultDB service requests.

use serde_json::{Map, Value};

/// Repeated field holding the results of `QueryArtifacts`.
pub const ARTIFACTS_FIELD: &str = "artifacts";

/// Name of the invocation that records the results of a Buildbucket build.
pub fn invocation_name(build_id: &str) -> String {
    format!("invocations/build-{}", build_id)
}

/// Payload for `QueryArtifacts` across the invocations of `build_ids`.
pub fn query_artifacts_request(build_ids: &[&str], predicate: Value) -> Map<String, Value> {
    let invocations = build_ids
        .iter()
        .map(|id| Value::from(invocation_name(id)))
        .collect();
    let mut request = Map::new();
    request.insert("invocations".to_string(), Value::Array(invocations));
    request.insert("predicate".to_string(), predicate);
    request
}
