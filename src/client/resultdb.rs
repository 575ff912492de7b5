//! ResultDB client

use std::sync::Arc;

use serde_json::Value;

use luci_rpc_protocol::ops::names;
use luci_rpc_protocol::ops::resultdb::{self, ARTIFACTS_FIELD};

use crate::config::ServiceConfig;

use super::auth::TokenProvider;
use super::channel::RpcChannel;
use super::paginate::PaginatedFetch;
use super::transport::Transport;

/// Client for the `luci.resultdb.v1.ResultDB` service.
#[derive(Debug, Clone)]
pub struct ResultDbClient {
    channel: RpcChannel,
}

impl ResultDbClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn from_config(config: &ServiceConfig, transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::new(RpcChannel::new(transport, tokens, config.host.as_str(), config.service.as_str()))
    }

    pub fn channel(&self) -> &RpcChannel {
        &self.channel
    }

    /// Fetch up to `count` artifacts recorded by the given builds.
    pub fn query_artifacts(
        &self,
        build_ids: &[&str],
        predicate: Value,
        page_size: Option<usize>,
        count: usize,
    ) -> Vec<Value> {
        let request = resultdb::query_artifacts_request(build_ids, predicate);
        PaginatedFetch::new(&self.channel, names::QUERY_ARTIFACTS, ARTIFACTS_FIELD)
            .page_size(page_size)
            .count(count)
            .fetch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::auth::StaticTokenProvider;
    use crate::client::transport::MockTransport;
    use crate::mock::MockServer;
    use serde_json::json;

    fn create_client(server: MockServer) -> (Arc<MockTransport>, ResultDbClient) {
        let transport = Arc::new(MockTransport::with_server(server));
        let client = ResultDbClient::from_config(
            &ServiceConfig::resultdb(),
            transport.clone(),
            Arc::new(StaticTokenProvider::new("token")),
        );
        (transport, client)
    }

    #[test]
    fn test_query_artifacts_across_builds() {
        let server = MockServer::new();
        for (build, count) in [("1", 3), ("2", 2)] {
            for i in 0..count {
                server.add_artifact(
                    &format!("invocations/build-{}", build),
                    json!({"artifactId": format!("a{}", i), "name": format!("build-{}/a{}", build, i)}),
                );
            }
        }
        let (transport, client) = create_client(server);

        let artifacts = client.query_artifacts(&["1", "2"], json!({}), Some(2), 100);
        assert_eq!(artifacts.len(), 5);
        assert_eq!(artifacts[4]["name"], "build-2/a1");
        assert_eq!(transport.call_count("QueryArtifacts"), 3);

        let request = transport.requests()[0].clone();
        assert_eq!(
            request.url.as_str(),
            "https://results.api.cr.dev/prpc/luci.resultdb.v1.ResultDB/QueryArtifacts"
        );
        assert_eq!(
            request.json().unwrap()["invocations"],
            json!(["invocations/build-1", "invocations/build-2"])
        );
    }

    #[test]
    fn test_query_artifacts_respects_count() {
        let server = MockServer::new();
        for i in 0..10 {
            server.add_artifact("invocations/build-9", json!({"artifactId": i.to_string()}));
        }
        let (transport, client) = create_client(server);

        let artifacts = client.query_artifacts(&["9"], Value::Null, None, 4);
        assert_eq!(artifacts.len(), 4);
        assert_eq!(transport.call_count("QueryArtifacts"), 1);
        assert_eq!(transport.last_request().unwrap().json().unwrap()["pageSize"], 4);
    }
}
