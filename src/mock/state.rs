//! Mock Server State
//!
//! Builds and artifacts the mock serves, plus the lookups behind each method.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use luci_rpc_protocol::envelope::{NEXT_PAGE_TOKEN_FIELD, PAGE_SIZE_FIELD, PAGE_TOKEN_FIELD};

/// Page size when a request does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// gRPC status codes the mock reports.
pub mod codes {
    pub const INVALID_ARGUMENT: i64 = 3;
    pub const NOT_FOUND: i64 = 5;
    pub const UNIMPLEMENTED: i64 = 12;
}

/// A logical method failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockError {
    /// gRPC status code
    pub code: i64,
    pub message: String,
}

impl MockError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            code: codes::INVALID_ARGUMENT,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: codes::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unimplemented(method: &str) -> Self {
        Self {
            code: codes::UNIMPLEMENTED,
            message: format!("method {} is not implemented", method),
        }
    }

    /// HTTP status pRPC uses for this code.
    pub fn http_status(&self) -> u16 {
        match self.code {
            codes::INVALID_ARGUMENT => 400,
            codes::NOT_FOUND => 404,
            codes::UNIMPLEMENTED => 501,
            _ => 500,
        }
    }

    /// `{"code": .., "message": ..}` as found in a batch sub-response.
    pub fn to_value(&self) -> Value {
        json!({"code": self.code, "message": self.message})
    }
}

/// A build known to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockBuild {
    pub id: String,
    pub project: String,
    pub bucket: String,
    pub builder: String,
    pub number: u64,
    pub status: String,
}

impl MockBuild {
    /// A `chromium` build in `SUCCESS` state.
    pub fn new(id: impl Into<String>, bucket: impl Into<String>, builder: impl Into<String>, number: u64) -> Self {
        Self {
            id: id.into(),
            project: "chromium".to_string(),
            bucket: bucket.into(),
            builder: builder.into(),
            number,
            status: "SUCCESS".to_string(),
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "builder": {
                "project": self.project,
                "bucket": self.bucket,
                "builder": self.builder
            },
            "number": self.number,
            "status": self.status
        })
    }

    /// True when every field set in a `BuilderID` object matches.
    fn matches_builder(&self, builder: &Value) -> bool {
        let field_matches = |key: &str, actual: &str| {
            builder
                .get(key)
                .and_then(Value::as_str)
                .map_or(true, |wanted| wanted == actual)
        };
        field_matches("project", &self.project)
            && field_matches("bucket", &self.bucket)
            && field_matches("builder", &self.builder)
    }
}

/// Data served by the mock.
#[derive(Debug)]
pub struct MockState {
    builds: Vec<MockBuild>,
    artifacts: HashMap<String, Vec<Value>>,
    /// Server-side cap on page size
    pub max_page_size: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            builds: Vec::new(),
            artifacts: HashMap::new(),
            max_page_size: 1000,
        }
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build(&mut self, build: MockBuild) {
        self.builds.push(build);
    }

    pub fn add_artifact(&mut self, invocation: &str, artifact: Value) {
        self.artifacts.entry(invocation.to_string()).or_default().push(artifact);
    }

    /// `GetBuild`: by ID, or by builder plus number, or the builder's latest.
    pub fn get_build(&self, request: &Value) -> Result<Value, MockError> {
        if let Some(id) = request.get("id").and_then(Value::as_str) {
            return self
                .builds
                .iter()
                .find(|build| build.id == id)
                .map(MockBuild::to_json)
                .ok_or_else(|| MockError::not_found(format!("build {} not found", id)));
        }

        let builder = request
            .get("builder")
            .ok_or_else(|| MockError::invalid_argument("id or builder is required"))?;
        let candidates = self.builds.iter().filter(|build| build.matches_builder(builder));
        let found = match request.get("buildNumber").and_then(Value::as_u64) {
            Some(number) => candidates.filter(|build| build.number == number).last(),
            None => candidates.max_by_key(|build| build.number),
        };
        found
            .map(MockBuild::to_json)
            .ok_or_else(|| MockError::not_found(format!("build not found for builder {}", builder)))
    }

    /// `SearchBuilds`: newest first, filtered by builder and status.
    pub fn search_builds(&self, request: &Value) -> Result<Value, MockError> {
        let predicate = request.get("predicate").cloned().unwrap_or(Value::Null);
        let status = predicate.get("status").and_then(Value::as_str);

        let mut builds: Vec<&MockBuild> = self
            .builds
            .iter()
            .filter(|build| predicate.get("builder").map_or(true, |b| build.matches_builder(b)))
            .filter(|build| status.map_or(true, |s| build.status == s))
            .collect();
        builds.sort_by(|a, b| b.number.cmp(&a.number).then_with(|| a.id.cmp(&b.id)));

        let builds = builds.into_iter().map(MockBuild::to_json).collect();
        self.paginate(builds, request, "builds")
    }

    /// `QueryArtifacts`: artifacts of each named invocation, in request order.
    pub fn query_artifacts(&self, request: &Value) -> Result<Value, MockError> {
        let invocations = request
            .get("invocations")
            .and_then(Value::as_array)
            .ok_or_else(|| MockError::invalid_argument("invocations is required"))?;

        let artifacts = invocations
            .iter()
            .filter_map(Value::as_str)
            .flat_map(|name| self.artifacts.get(name).into_iter().flatten().cloned())
            .collect();
        self.paginate(artifacts, request, "artifacts")
    }

    /// Slice `items` by `pageSize`/`pageToken`. Empty pages omit the
    /// repeated field, as proto3 JSON does.
    fn paginate(&self, items: Vec<Value>, request: &Value, field: &str) -> Result<Value, MockError> {
        let page_size = request
            .get(PAGE_SIZE_FIELD)
            .and_then(Value::as_u64)
            .map(|size| size as usize)
            .filter(|&size| size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(self.max_page_size.max(1));

        let offset = match request.get(PAGE_TOKEN_FIELD).and_then(Value::as_str) {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| MockError::invalid_argument(format!("bad page token {:?}", token)))?,
            None => 0,
        };

        let end = offset.saturating_add(page_size).min(items.len());
        let page: Vec<Value> = items.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();

        let mut response = Map::new();
        if !page.is_empty() {
            response.insert(field.to_string(), Value::Array(page));
        }
        if end < items.len() {
            response.insert(NEXT_PAGE_TOKEN_FIELD.to_string(), Value::String(end.to_string()));
        }
        Ok(Value::Object(response))
    }
}
