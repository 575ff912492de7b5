//! Buildbucket `Builds` service requests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::BuildRef;

/// Repeated field holding the results of `SearchBuilds`.
pub const BUILDS_FIELD: &str = "builds";

/// Fully-qualified builder identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderId {
    pub project: String,
    pub bucket: String,
    pub builder: String,
}

impl BuilderId {
    pub fn new(project: impl Into<String>, bucket: impl Into<String>, builder: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            bucket: bucket.into(),
            builder: builder.into(),
        }
    }

    /// `{"project", "bucket", "builder"}`, in that order.
    pub fn to_value(&self) -> Value {
        json!(self)
    }
}

/// Payload for `GetBuild`.
///
/// Sets `id` when the reference carries a build ID, `builder` when it names
/// a builder, and `buildNumber` for a non-zero build number. Field masks for
/// a single build take bare field names.
pub fn get_build_request(build: &BuildRef, project: &str, bucket: &str, fields: &[&str]) -> Map<String, Value> {
    let mut request = Map::new();
    if let Some(id) = build.build_id.as_deref().filter(|id| !id.is_empty()) {
        request.insert("id".to_string(), Value::from(id));
    }
    if !build.builder_name.is_empty() {
        let builder = BuilderId::new(project, bucket, build.builder_name.as_str());
        request.insert("builder".to_string(), builder.to_value());
    }
    if let Some(number) = build.build_number.filter(|&n| n != 0) {
        request.insert("buildNumber".to_string(), Value::from(number));
    }
    if !fields.is_empty() {
        request.insert("fields".to_string(), Value::from(fields.join(",")));
    }
    request
}

/// Payload for `SearchBuilds`.
///
/// Field masks apply to each element of the repeated `builds` field, so
/// every field is rendered as `builds.*.<field>`.
pub fn search_builds_request(predicate: Value, fields: &[&str]) -> Map<String, Value> {
    let mut request = Map::new();
    request.insert("predicate".to_string(), predicate);
    if !fields.is_empty() {
        let mask = fields
            .iter()
            .map(|field| format!("{}.*.{}", BUILDS_FIELD, field))
            .collect::<Vec<_>>()
            .join(",");
        request.insert("fields".to_string(), Value::from(mask));
    }
    request
}

/// A `SearchBuilds` predicate matching every build of one builder.
pub fn builder_predicate(project: &str, bucket: &str, builder: &str) -> Value {
    let mut predicate = Map::new();
    predicate.insert(
        "builder".to_string(),
        BuilderId::new(project, bucket, builder).to_value(),
    );
    Value::Object(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_build_by_number() {
        let request = get_build_request(&BuildRef::numbered("linux-rel", 123), "chromium", "try", &[]);
        assert_eq!(
            Value::Object(request),
            json!({
                "builder": {"project": "chromium", "bucket": "try", "builder": "linux-rel"},
                "buildNumber": 123
            })
        );
    }

    #[test]
    fn test_get_build_by_id_with_fields() {
        let build = BuildRef::latest("linux-rel").with_id("8945511751514863184");
        let request = get_build_request(&build, "chromium", "ci", &["id", "status"]);

        assert_eq!(request["id"], "8945511751514863184");
        assert_eq!(request["builder"]["bucket"], "ci");
        assert_eq!(request["fields"], "id,status");
        assert!(request.get("buildNumber").is_none());
    }

    #[test]
    fn test_get_build_latest_has_no_number() {
        let request = get_build_request(&BuildRef::latest("mac-rel"), "chromium", "try", &[]);
        assert!(request.get("buildNumber").is_none());
        assert!(request.get("id").is_none());
    }

    #[test]
    fn test_get_build_key_order() {
        let build = BuildRef::numbered("linux-rel", 9).with_id("77");
        let request = get_build_request(&build, "chromium", "try", &["status"]);
        let keys: Vec<&str> = request.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "builder", "buildNumber", "fields"]);
    }

    #[test]
    fn test_search_builds_field_mask() {
        let predicate = builder_predicate("chromium", "try", "linux-rel");
        let request = search_builds_request(predicate, &["id", "number"]);

        assert_eq!(request["fields"], "builds.*.id,builds.*.number");
        assert_eq!(request["predicate"]["builder"]["builder"], "linux-rel");
    }

    #[test]
    fn test_builder_id_serde() {
        let id = BuilderId::new("chromium", "try", "linux-rel");
        assert_eq!(
            id.to_value().to_string(),
            r#"{"project":"chromium","bucket":"try","builder":"linux-rel"}"#
        );

        let parsed: BuilderId = serde_json::from_value(builder_predicate("chromium", "try", "linux-rel")["builder"].clone()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_search_builds_without_fields() {
        let request = search_builds_request(json!({"status": "FAILURE"}), &[]);
        assert_eq!(Value::Object(request), json!({"predicate": {"status": "FAILURE"}}));
    }
}
