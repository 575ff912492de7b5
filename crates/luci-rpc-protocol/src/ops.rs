//! Service-specific request shaping.

pub mod buildbucket;
pub mod resultdb;

pub use buildbucket::{builder_predicate, get_build_request, search_builds_request};
pub use resultdb::{invocation_name, query_artifacts_request};

/// Known method names.
///
/// Direct calls use the Pascal-case name in the URL; sub-requests inside a
/// `Batch` use the lower camel-case name as the entry key.
pub mod names {
    pub const GET_BUILD: &str = "GetBuild";
    pub const SEARCH_BUILDS: &str = "SearchBuilds";
    pub const QUERY_ARTIFACTS: &str = "QueryArtifacts";

    pub const BATCH_GET_BUILD: &str = "getBuild";
    pub const BATCH_SEARCH_BUILDS: &str = "searchBuilds";
}
