//! Cursor pagination
//!
//! Listing methods take `{..., "pageSize": N, "pageToken": T}` and reply with
//! `{<repeated field>: [...], "nextPageToken": T'}`. [`PaginatedFetch`] keeps
//! calling until it has `count` entities or the server runs out of pages.

use serde_json::{Map, Value};
use tracing::debug;

use luci_rpc_protocol::envelope::{NEXT_PAGE_TOKEN_FIELD, PAGE_SIZE_FIELD, PAGE_TOKEN_FIELD};
use luci_rpc_protocol::DEFAULT_COUNT;

use super::channel::RpcChannel;

/// Flattens a paginated listing method into one bounded `Vec`.
#[derive(Debug, Clone)]
pub struct PaginatedFetch<'c> {
    channel: &'c RpcChannel,
    method: &'c str,
    field: &'c str,
    page_size: Option<usize>,
    count: usize,
}

impl<'c> PaginatedFetch<'c> {
    /// Fetch the repeated `field` of `method`, up to the default count.
    pub fn new(channel: &'c RpcChannel, method: &'c str, field: &'c str) -> Self {
        Self {
            channel,
            method,
            field,
            page_size: None,
            count: DEFAULT_COUNT,
        }
    }

    /// Entities per request. Without one, everything is requested in a
    /// single page of `count`. The server may still return fewer.
    pub fn page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Total number of entities wanted.
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Walk the pages and return at most `count` entities.
    ///
    /// A failed call or a response that is not a JSON object ends the walk
    /// with whatever was gathered so far.
    pub fn fetch(&self, mut payload: Map<String, Value>) -> Vec<Value> {
        let page_size = self.page_size.filter(|&size| size > 0).unwrap_or(self.count);
        payload.insert(PAGE_SIZE_FIELD.to_string(), Value::from(page_size));
        let mut request = Value::Object(payload);

        let mut entities = Vec::new();
        let mut pages = 0usize;
        while entities.len() < self.count {
            let mut response = match self.channel.call(self.method, &request).into_value() {
                Some(Value::Object(response)) => response,
                _ => break,
            };
            pages += 1;

            if let Some(Value::Array(page)) = response.remove(self.field) {
                entities.extend(page);
            }
            debug!(method = self.method, page = pages, total = entities.len(), "fetched page");

            match response.remove(NEXT_PAGE_TOKEN_FIELD) {
                Some(Value::String(token)) if !token.is_empty() => {
                    request[PAGE_TOKEN_FIELD] = Value::String(token);
                }
                _ => break,
            }
        }

        entities.truncate(self.count);
        entities
    }
}
