//! Shared fixtures for integration tests
//!
//! A mock backend seeded with a small build history and matching artifacts,
//! plus clients wired to it through `MockTransport`.

#![allow(dead_code)]

use std::sync::Arc;

use luci_rpc::client::{MockTransport, StaticTokenProvider};
use luci_rpc::config::ClientConfig;
use luci_rpc::mock::{MockBuild, MockServer};
use luci_rpc::{BuildbucketClient, ResultDbClient};
use serde_json::json;

/// Builds 1000..1005 of `linux-rel` (IDs "8800000001000".. ) and two `mac-rel` builds.
pub fn seeded_server() -> MockServer {
    let server = MockServer::new();
    for number in 1000..1006u64 {
        let status = if number % 2 == 0 { "SUCCESS" } else { "FAILURE" };
        server.add_build(MockBuild::new(build_id(number), "try", "linux-rel", number).status(status));
    }
    server.add_build(MockBuild::new("7700000000001", "try", "mac-rel", 1));
    server.add_build(MockBuild::new("7700000000002", "ci", "mac-rel", 2));

    for number in [1004u64, 1005] {
        let invocation = format!("invocations/build-{}", build_id(number));
        for name in ["stdout", "screenshot.png", "trace.json"] {
            server.add_artifact(
                &invocation,
                json!({
                    "name": format!("{}/artifacts/{}", invocation, name),
                    "artifactId": name,
                    "contentType": "text/plain"
                }),
            );
        }
    }
    server
}

pub fn build_id(number: u64) -> String {
    format!("88000000{:05}", number)
}

/// Both clients sharing one recording transport.
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub buildbucket: BuildbucketClient,
    pub resultdb: ResultDbClient,
}

impl Harness {
    pub fn new(server: MockServer) -> Self {
        let config = ClientConfig::default();
        let transport = Arc::new(MockTransport::with_server(server));
        let tokens = Arc::new(StaticTokenProvider::new("ya29.test-token"));
        Self {
            buildbucket: BuildbucketClient::from_config(&config.buildbucket, transport.clone(), tokens.clone()),
            resultdb: ResultDbClient::from_config(&config.resultdb, transport.clone(), tokens),
            transport,
        }
    }

    pub fn seeded() -> Self {
        Self::new(seeded_server())
    }

    pub fn server(&self) -> &MockServer {
        self.transport.server()
    }
}
