//! LUCI pRPC client
//!
//! A blocking client for the Buildbucket and ResultDB pRPC services:
//! authenticated calls with anti-hijacking prefix handling, transparent
//! pagination over listing methods, and `Batch` multiplexing with
//! per-item errors.

pub mod client;
pub mod config;
pub mod logging;
pub mod mock;

pub use client::{
    BatchExecutor, BatchItem, BatchResults, BuildbucketClient, CallFailure, CallOutcome, PaginatedFetch,
    ResultDbClient, RpcChannel, TokenProvider, Transport,
};
pub use config::{ClientConfig, ConfigError, EffectiveConfig};
pub use luci_rpc_protocol::{BuildRef, RpcError};
