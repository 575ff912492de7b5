//! Pagination tests
//!
//! Listing methods follow `nextPageToken` until `count` entities arrive or
//! the server runs out.

mod fixtures;

use fixtures::{build_id, Harness};
use luci_rpc::mock::{FailureConfig, MockReply};
use serde_json::json;

#[test]
fn test_search_walks_every_page() {
    let harness = Harness::seeded();
    let predicate = harness.buildbucket.builder_predicate("try", "linux-rel");

    let builds = harness.buildbucket.search_builds(predicate, &[], Some(4), 100);
    assert_eq!(builds.len(), 6);
    assert_eq!(builds[0]["number"], 1005);
    assert_eq!(builds[5]["number"], 1000);

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 2);
    let second = requests[1].json().unwrap();
    assert_eq!(second["pageToken"], "4");
    assert_eq!(second["pageSize"], 4);
}

#[test]
fn test_search_stops_at_count() {
    let harness = Harness::seeded();
    let predicate = harness.buildbucket.builder_predicate("try", "linux-rel");

    let builds = harness.buildbucket.search_builds(predicate, &[], Some(2), 3);
    assert_eq!(builds.len(), 3);
    assert_eq!(harness.transport.call_count("SearchBuilds"), 2);
}

#[test]
fn test_search_with_status_predicate() {
    let harness = Harness::seeded();
    let mut predicate = harness.buildbucket.builder_predicate("try", "linux-rel");
    predicate["status"] = json!("FAILURE");

    let builds = harness.buildbucket.search_builds(predicate, &[], None, 10);
    let numbers: Vec<_> = builds.iter().map(|b| b["number"].as_u64().unwrap()).collect();
    assert_eq!(numbers, vec![1005, 1003, 1001]);
}

#[test]
fn test_server_page_cap_is_followed() {
    let harness = Harness::seeded();
    harness.server().set_max_page_size(1);
    let predicate = harness.buildbucket.builder_predicate("try", "linux-rel");

    let builds = harness.buildbucket.search_builds(predicate, &[], None, 4);
    assert_eq!(builds.len(), 4);
    assert_eq!(harness.transport.call_count("SearchBuilds"), 4);
}

#[test]
fn test_failure_mid_walk_keeps_earlier_pages() {
    let harness = Harness::seeded();
    harness.server().push_reply(
        "SearchBuilds",
        MockReply::json(json!({"builds": [{"number": 1}, {"number": 2}], "nextPageToken": "2"})),
    );
    harness
        .server()
        .push_reply("SearchBuilds", MockReply::raw(500, b"boom".to_vec()));
    let predicate = harness.buildbucket.builder_predicate("try", "linux-rel");

    let builds = harness.buildbucket.search_builds(predicate, &[], Some(2), 10);
    assert_eq!(builds, vec![json!({"number": 1}), json!({"number": 2})]);
    assert_eq!(harness.transport.call_count("SearchBuilds"), 2);
}

#[test]
fn test_failed_first_page_yields_nothing() {
    let harness = Harness::seeded();
    harness
        .server()
        .inject_failure("SearchBuilds", FailureConfig::status(403, "denied"));
    let predicate = harness.buildbucket.builder_predicate("try", "linux-rel");

    assert!(harness.buildbucket.search_builds(predicate, &[], Some(2), 10).is_empty());
}

#[test]
fn test_no_matches() {
    let harness = Harness::seeded();
    let predicate = harness.buildbucket.builder_predicate("try", "win-rel");

    assert!(harness.buildbucket.search_builds(predicate, &[], None, 10).is_empty());
    assert_eq!(harness.transport.call_count("SearchBuilds"), 1);
}

#[test]
fn test_artifacts_across_invocations() {
    let harness = Harness::seeded();
    let ids = [build_id(1005), build_id(1004)];
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

    let artifacts = harness.resultdb.query_artifacts(&ids, json!({}), Some(4), 100);
    assert_eq!(artifacts.len(), 6);
    assert!(artifacts[0]["name"]
        .as_str()
        .unwrap()
        .starts_with(&format!("invocations/build-{}", build_id(1005))));
    assert_eq!(harness.transport.call_count("QueryArtifacts"), 2);
}

#[test]
fn test_artifacts_for_unknown_build() {
    let harness = Harness::seeded();
    assert!(harness.resultdb.query_artifacts(&["1"], json!({}), None, 10).is_empty());
}
