//! Mock pRPC Backend
//!
//! In-process stand-ins for Buildbucket and ResultDB, used by
//! `MockTransport` in tests.

pub mod failure;
pub mod server;
pub mod state;

pub use failure::{FailureConfig, FailureInjector, MockReply};
pub use server::MockServer;
pub use state::{MockBuild, MockError, MockState};
