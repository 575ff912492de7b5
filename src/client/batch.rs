//! Batched calls
//!
//! [`BatchExecutor`] queues logical calls and sends them as one `Batch`
//! request. The combined response is fanned back out by [`BatchResults`], an
//! iterator that yields entities in enqueue order and stops at the first
//! per-item error.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use serde_json::Value;
use tracing::{debug, warn};

use luci_rpc_protocol::envelope::{is_present, ERROR_FIELD};
use luci_rpc_protocol::{capitalize_method, BatchRequest, BatchResponse, ErrorPayload, RpcError, BATCH_METHOD};

use super::channel::{CallOutcome, RpcChannel};

/// One queued call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// Sub-request key, e.g. `getBuild`.
    pub method: String,
    pub payload: Value,
    /// Repeated field to pull out of the unwrapped response. Without one
    /// the whole unwrapped response is yielded as a single entity.
    pub extraction_field: Option<String>,
    /// Maximum number of extracted entities.
    pub limit: Option<usize>,
}

impl BatchItem {
    pub fn new(method: impl Into<String>, payload: Value) -> Self {
        Self {
            method: method.into(),
            payload,
            extraction_field: None,
            limit: None,
        }
    }

    /// Yield the elements of `field`, at most `limit` of them.
    pub fn extract(mut self, field: impl Into<String>, limit: Option<usize>) -> Self {
        self.extraction_field = Some(field.into());
        self.limit = limit;
        self
    }

    /// Turn this item's sub-response into the entities it yields.
    fn demux(self, mut response: Value) -> Result<Vec<Value>, RpcError> {
        if let Some(error) = response.get(ERROR_FIELD).filter(|e| is_present(e)) {
            let payload = ErrorPayload::from_value(error);
            return Err(RpcError::from_payload(&self.method, &payload, Some(self.payload)));
        }

        let unwrapped = match response.get_mut(&self.method) {
            Some(value) => value.take(),
            None => {
                return Err(RpcError::new(
                    capitalize_method(&self.method),
                    format!("batch response is missing the '{}' field", self.method),
                )
                .with_request_body(self.payload));
            }
        };

        let Some(field) = self.extraction_field else {
            return Ok(vec![unwrapped]);
        };
        let mut entities = match unwrapped {
            Value::Object(mut map) => match map.remove(&field) {
                Some(Value::Array(entities)) => entities,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        if let Some(limit) = self.limit {
            entities.truncate(limit);
        }
        Ok(entities)
    }
}

/// Queue of calls to send as one `Batch` request.
///
/// Not synchronized: share one executor across threads only behind a lock.
#[derive(Debug)]
pub struct BatchExecutor {
    channel: RpcChannel,
    queue: Vec<BatchItem>,
}

impl BatchExecutor {
    pub fn new(channel: RpcChannel) -> Self {
        Self {
            channel,
            queue: Vec::new(),
        }
    }

    /// Queue a call. No network activity.
    pub fn enqueue(&mut self, item: BatchItem) {
        self.queue.push(item);
    }

    /// Items waiting for the next [`execute`](Self::execute).
    pub fn pending(&self) -> &[BatchItem] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop the queued items without sending them.
    pub fn reset(&mut self) {
        self.queue.clear();
    }

    /// Send every queued item in one `Batch` call.
    ///
    /// The queue is drained before the call is made, so items enqueued while
    /// the results are being consumed start a new batch. An empty queue makes
    /// no call. If the `Batch` call itself fails, the results hold a single
    /// error for the whole batch.
    pub fn execute(&mut self) -> BatchResults {
        if self.queue.is_empty() {
            return BatchResults::empty();
        }
        let items = std::mem::take(&mut self.queue);

        let mut request = BatchRequest::new();
        for item in &items {
            request.push(item.method.as_str(), item.payload.clone());
        }
        let body = request.to_value();
        debug!(items = items.len(), "executing batch request");

        match self.channel.call(BATCH_METHOD, &body) {
            CallOutcome::Success(value) => {
                let responses = BatchResponse::from_value(value).responses;
                if responses.len() != items.len() {
                    warn!(
                        requests = items.len(),
                        responses = responses.len(),
                        "batch response count does not match request count"
                    );
                }
                BatchResults::new(items.into_iter().zip(responses).collect())
            }
            CallOutcome::Failure(failure) => {
                warn!(items = items.len(), error = %failure, "batch request failed");
                BatchResults::failed(RpcError::new(BATCH_METHOD, failure.to_string()).with_request_body(body))
            }
        }
    }
}

/// Entities produced by one executed batch.
///
/// Yields `Ok(entity)` in enqueue order. The first failing item yields
/// `Err(RpcError)` and ends the iteration; entities already yielded stay
/// valid, later items are never produced.
#[derive(Debug)]
pub struct BatchResults {
    pairs: std::vec::IntoIter<(BatchItem, Value)>,
    ready: VecDeque<Value>,
    error: Option<RpcError>,
    done: bool,
}

impl BatchResults {
    fn new(pairs: Vec<(BatchItem, Value)>) -> Self {
        Self {
            pairs: pairs.into_iter(),
            ready: VecDeque::new(),
            error: None,
            done: false,
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn failed(error: RpcError) -> Self {
        Self {
            error: Some(error),
            ..Self::empty()
        }
    }

    /// Collect every entity, or the first error.
    pub fn collect_all(self) -> Result<Vec<Value>, RpcError> {
        self.collect()
    }
}

impl Iterator for BatchResults {
    type Item = Result<Value, RpcError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.ready.pop_front() {
                return Some(Ok(entity));
            }
            if self.done {
                return None;
            }
            if let Some(error) = self.error.take() {
                self.done = true;
                return Some(Err(error));
            }

            let Some((item, response)) = self.pairs.next() else {
                self.done = true;
                return None;
            };
            match item.demux(response) {
                Ok(entities) => self.ready.extend(entities),
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

impl FusedIterator for BatchResults {}
