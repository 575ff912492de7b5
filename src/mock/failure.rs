//! Failure Injection for the Mock Server
//!
//! Per-method overrides for testing error paths: a fixed HTTP status, a
//! dropped connection, or a scripted reply queue.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use luci_rpc_protocol::RESPONSE_PREFIX;

/// A canned HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl MockReply {
    /// HTTP 200 with a JSON body behind the anti-hijacking prefix.
    pub fn json(value: Value) -> Self {
        let mut body = RESPONSE_PREFIX.to_vec();
        body.push(b'\n');
        body.extend_from_slice(value.to_string().as_bytes());
        Self { status: 200, body }
    }

    /// Exact status and body bytes.
    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Drop the anti-hijacking prefix line from a JSON reply.
    pub fn without_prefix(mut self) -> Self {
        if let Some(rest) = self.body.strip_prefix(RESPONSE_PREFIX) {
            self.body = rest.strip_prefix(b"\n").unwrap_or(rest).to_vec();
        }
        self
    }
}

/// What to do instead of serving a method normally.
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Status to answer with (ignored when `disconnect` is set)
    pub status: u16,
    /// Body sent with the status
    pub body: Vec<u8>,
    /// Fail at the transport level instead of answering
    pub disconnect: bool,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Answer with a non-200 status.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into().into_bytes(),
            disconnect: false,
            fail_count: None,
        }
    }

    /// Fail the POST itself, as if the connection dropped.
    pub fn disconnect() -> Self {
        Self {
            status: 0,
            body: Vec::new(),
            disconnect: true,
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Per-method failures and scripted replies.
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<String, FailureConfig>,
    call_counts: HashMap<String, u32>,
    replies: HashMap<String, VecDeque<MockReply>>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the failure for `method`.
    pub fn inject(&mut self, method: &str, config: FailureConfig) {
        self.configs.insert(method.to_string(), config);
        self.call_counts.insert(method.to_string(), 0);
    }

    /// Queue a reply for the next call to `method`.
    pub fn push_reply(&mut self, method: &str, reply: MockReply) {
        self.replies.entry(method.to_string()).or_default().push_back(reply);
    }

    /// Clear all failures and scripted replies.
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
        self.replies.clear();
    }

    /// Failure to apply to this call of `method`, if any.
    pub fn check(&mut self, method: &str) -> Option<FailureConfig> {
        let config = self.configs.get(method)?;
        let count = self.call_counts.entry(method.to_string()).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config.clone()),
        }
    }

    /// Next scripted reply for `method`, if any.
    pub fn next_reply(&mut self, method: &str) -> Option<MockReply> {
        self.replies.get_mut(method)?.pop_front()
    }
}
