//! MethodRegistry — method name to the ordered list of handlers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use switchboard_protocol::Params;

use crate::error::HandlerError;
use crate::reply::Reply;

/// A registered handler. `Reply` is present only for calls.
pub type Handler = Arc<dyn Fn(Params, Option<Reply>) -> Result<(), HandlerError> + Send + Sync>;

/// Append-only registration table.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; earlier registrations under the same name are kept.
    pub fn register(&self, method: String, handler: Handler) {
        self.handlers.write().entry(method).or_default().push(handler);
    }

    /// Snapshot of the handlers for `method`, in registration order.
    ///
    /// The lock is released before the caller invokes anything, so handlers
    /// may register further methods.
    pub fn lookup(&self, method: &str) -> Option<Vec<Handler>> {
        self.handlers.read().get(method).cloned()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn handler_count(&self, method: &str) -> usize {
        self.handlers.read().get(method).map_or(0, Vec::len)
    }
}
