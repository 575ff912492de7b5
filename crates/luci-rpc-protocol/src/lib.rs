//! pRPC Protocol Types
//!
//! Wire-level types shared by the pRPC client: request framing, response
//! envelope unwrapping, the `Batch` envelope, pagination field names, and
//! request shaping for the Buildbucket and ResultDB services.
//!
//! Nothing in this crate performs I/O.

pub mod build_ref;
pub mod envelope;
pub mod error;
pub mod ops;

pub use build_ref::{BuildRef, ParseBuildRefError};
pub use envelope::{BatchRequest, BatchResponse, RESPONSE_PREFIX};
pub use error::{capitalize_method, ErrorPayload, RpcError};

/// First path segment of every pRPC endpoint.
pub const PRPC_NAMESPACE: &str = "prpc";

/// Method name of the multiplexing endpoint.
pub const BATCH_METHOD: &str = "Batch";

/// Default number of entities requested from a listing method.
pub const DEFAULT_COUNT: usize = 1000;
