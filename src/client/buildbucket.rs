//! Buildbucket client
//!
//! Method table for the `buildbucket.v2.Builds` service: single `GetBuild`
//! calls, paginated `SearchBuilds`, and the batched forms of both.

use std::sync::Arc;

use serde_json::Value;

use luci_rpc_protocol::ops::buildbucket::{self, BUILDS_FIELD};
use luci_rpc_protocol::ops::names;
use luci_rpc_protocol::{BuildRef, DEFAULT_COUNT};

use crate::config::BuildbucketConfig;

use super::auth::TokenProvider;
use super::batch::{BatchExecutor, BatchItem, BatchResults};
use super::channel::{CallOutcome, RpcChannel};
use super::paginate::PaginatedFetch;
use super::transport::Transport;

/// Client for the Buildbucket `Builds` service.
#[derive(Debug)]
pub struct BuildbucketClient {
    channel: RpcChannel,
    batch: BatchExecutor,
    project: String,
}

impl BuildbucketClient {
    /// Create a client for builds of `project` served by `channel`.
    pub fn new(channel: RpcChannel, project: impl Into<String>) -> Self {
        Self {
            batch: BatchExecutor::new(channel.clone()),
            channel,
            project: project.into(),
        }
    }

    /// Create a client from the `[buildbucket]` config section.
    pub fn from_config(
        config: &BuildbucketConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let channel = RpcChannel::new(transport, tokens, config.host.as_str(), config.service.as_str());
        Self::new(channel, config.project.as_str())
    }

    pub fn channel(&self) -> &RpcChannel {
        &self.channel
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Predicate matching every build of `builder` in `bucket`.
    pub fn builder_predicate(&self, bucket: &str, builder: &str) -> Value {
        buildbucket::builder_predicate(&self.project, bucket, builder)
    }

    /// Fetch one build. `fields` limits the returned build fields.
    pub fn get_build(&self, build: &BuildRef, bucket: &str, fields: &[&str]) -> CallOutcome {
        let request = buildbucket::get_build_request(build, &self.project, bucket, fields);
        self.channel.call(names::GET_BUILD, &Value::Object(request))
    }

    /// Fetch up to `count` builds matching `predicate`, newest first.
    pub fn search_builds(
        &self,
        predicate: Value,
        fields: &[&str],
        page_size: Option<usize>,
        count: usize,
    ) -> Vec<Value> {
        let request = buildbucket::search_builds_request(predicate, fields);
        PaginatedFetch::new(&self.channel, names::SEARCH_BUILDS, BUILDS_FIELD)
            .page_size(page_size)
            .count(count)
            .fetch(request)
    }

    /// Queue a `GetBuild` for the next [`execute_batch`](Self::execute_batch).
    pub fn enqueue_get_build(&mut self, build: &BuildRef, bucket: &str, fields: &[&str]) {
        let request = buildbucket::get_build_request(build, &self.project, bucket, fields);
        self.batch
            .enqueue(BatchItem::new(names::BATCH_GET_BUILD, Value::Object(request)));
    }

    /// Queue a `SearchBuilds`.
    ///
    /// Batched searches are not paginated: the first page is truncated to
    /// `count` builds.
    pub fn enqueue_search_builds(&mut self, predicate: Value, fields: &[&str], count: Option<usize>) {
        let request = buildbucket::search_builds_request(predicate, fields);
        let item = BatchItem::new(names::BATCH_SEARCH_BUILDS, Value::Object(request))
            .extract(BUILDS_FIELD, Some(count.unwrap_or(DEFAULT_COUNT)));
        self.batch.enqueue(item);
    }

    /// Number of queued batch requests.
    pub fn pending_batch(&self) -> usize {
        self.batch.len()
    }

    /// Send the queued requests as one `Batch` call.
    ///
    /// The queue is cleared whether or not the results are consumed.
    pub fn execute_batch(&mut self) -> BatchResults {
        self.batch.execute()
    }

    /// Discard queued requests without sending them.
    pub fn clear_batch(&mut self) {
        self.batch.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::auth::StaticTokenProvider;
    use crate::client::transport::MockTransport;
    use crate::mock::{MockBuild, MockServer};
    use serde_json::json;

    fn create_client(server: MockServer) -> (Arc<MockTransport>, BuildbucketClient) {
        let transport = Arc::new(MockTransport::with_server(server));
        let client = BuildbucketClient::from_config(
            &BuildbucketConfig::default(),
            transport.clone(),
            Arc::new(StaticTokenProvider::new("token")),
        );
        (transport, client)
    }

    fn seeded_server() -> MockServer {
        let server = MockServer::new();
        server.add_build(MockBuild::new("100", "try", "linux-rel", 10).status("SUCCESS"));
        server.add_build(MockBuild::new("101", "try", "linux-rel", 11).status("FAILURE"));
        server.add_build(MockBuild::new("102", "try", "linux-rel", 12).status("SUCCESS"));
        server.add_build(MockBuild::new("200", "try", "mac-rel", 5).status("SUCCESS"));
        server
    }

    #[test]
    fn test_get_build_by_number() {
        let (transport, client) = create_client(seeded_server());

        let build = client
            .get_build(&BuildRef::numbered("linux-rel", 11), "try", &[])
            .into_value()
            .unwrap();
        assert_eq!(build["id"], "101");
        assert_eq!(build["status"], "FAILURE");

        let request = transport.last_request().unwrap();
        assert_eq!(
            request.url.as_str(),
            "https://cr-buildbucket.appspot.com/prpc/buildbucket.v2.Builds/GetBuild"
        );
        assert_eq!(
            request.json().unwrap(),
            json!({
                "builder": {"project": "chromium", "bucket": "try", "builder": "linux-rel"},
                "buildNumber": 11
            })
        );
    }

    #[test]
    fn test_get_build_latest() {
        let (_, client) = create_client(seeded_server());
        let build = client
            .get_build(&BuildRef::latest("linux-rel"), "try", &[])
            .into_value()
            .unwrap();
        assert_eq!(build["number"], 12);
    }

    #[test]
    fn test_get_missing_build_is_absent() {
        let (_, client) = create_client(seeded_server());
        let outcome = client.get_build(&BuildRef::numbered("linux-rel", 99), "try", &[]);
        assert_eq!(outcome.failure().and_then(|f| f.status()), Some(404));
    }

    #[test]
    fn test_search_builds_paginates() {
        let (transport, client) = create_client(seeded_server());
        let predicate = client.builder_predicate("try", "linux-rel");

        let builds = client.search_builds(predicate, &["id", "number"], Some(2), 10);
        let numbers: Vec<_> = builds.iter().map(|b| b["number"].as_u64().unwrap()).collect();
        assert_eq!(numbers, vec![12, 11, 10]);
        assert_eq!(transport.call_count("SearchBuilds"), 2);

        let first = transport.requests()[0].json().unwrap();
        assert_eq!(first["fields"], "builds.*.id,builds.*.number");
        assert_eq!(first["pageSize"], 2);
    }

    #[test]
    fn test_batch_get_and_search() {
        let (transport, mut client) = create_client(seeded_server());

        client.enqueue_get_build(&BuildRef::numbered("mac-rel", 5), "try", &[]);
        let predicate = client.builder_predicate("try", "linux-rel");
        client.enqueue_search_builds(predicate, &[], Some(2));
        assert_eq!(client.pending_batch(), 2);

        let entities = client.execute_batch().collect_all().unwrap();
        assert_eq!(client.pending_batch(), 0);
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0]["id"], "200");
        assert_eq!(entities[1]["number"], 12);
        assert_eq!(entities[2]["number"], 11);

        assert_eq!(transport.call_count("Batch"), 1);
        let body = transport.last_request().unwrap().json().unwrap();
        assert!(body["requests"][0].get("getBuild").is_some());
        assert!(body["requests"][1]["searchBuilds"].get("pageSize").is_none());
    }

    #[test]
    fn test_clear_batch() {
        let (transport, mut client) = create_client(seeded_server());
        client.enqueue_get_build(&BuildRef::numbered("mac-rel", 5), "try", &[]);
        client.clear_batch();

        assert_eq!(client.execute_batch().count(), 0);
        assert!(transport.requests().is_empty());
    }
}
