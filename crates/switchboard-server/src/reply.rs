use serde_json::Value;
use switchboard_protocol::{RequestId, Response, RpcError};

use crate::batcher::ResponseBatcher;

/// Capability to answer one call.
///
/// Handed to handlers for calls only. It can be moved into another task and
/// used at any later point. Every handler registered for a method gets its
/// own clone, and each `send` buffers a response; duplicate replies for the
/// same id are not filtered.
#[derive(Clone)]
pub struct Reply {
    id: RequestId,
    force_batch: bool,
    batcher: ResponseBatcher,
}

impl Reply {
    pub(crate) fn new(id: RequestId, force_batch: bool, batcher: ResponseBatcher) -> Self {
        Self {
            id,
            force_batch,
            batcher,
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Whether the call arrived inside a batch.
    pub fn in_batch(&self) -> bool {
        self.force_batch
    }

    pub fn send(self, outcome: Result<Value, RpcError>) {
        let response = Response::new(self.id.to_value(), outcome.into());
        self.batcher.enqueue(response, self.force_batch);
    }

    pub fn ok(self, result: Value) {
        self.send(Ok(result));
    }

    pub fn err(self, error: RpcError) {
        self.send(Err(error));
    }
}
