//! pRPC Client
//!
//! Talks to Buildbucket and ResultDB over pRPC: authenticated single calls,
//! transparent pagination, and atomic batches with per-item errors.

pub mod auth;
pub mod batch;
pub mod buildbucket;
pub mod channel;
pub mod paginate;
pub mod resultdb;
pub mod transport;

pub use auth::{AuthError, CommandTokenProvider, EnvTokenProvider, StaticTokenProvider, TokenProvider};
pub use batch::{BatchExecutor, BatchItem, BatchResults};
pub use buildbucket::BuildbucketClient;
pub use channel::{CallFailure, CallOutcome, RpcChannel};
pub use paginate::PaginatedFetch;
pub use resultdb::ResultDbClient;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, MockTransport, Transport, TransportError};
