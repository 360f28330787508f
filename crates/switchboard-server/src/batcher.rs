//! Response batching.
//!
//! Responses produced while handling one inbound message are buffered and
//! written in a single `send` on the next turn of the dispatcher loop. The
//! outbound shape follows the inbound one: an array when the message was a
//! batch (or more than one response accumulated), a bare object otherwise.

use std::sync::Arc;

use parking_lot::Mutex;
use switchboard_protocol::Response;
use switchboard_transport::Channel;
use tokio::sync::mpsc;
use tracing::{debug, error};

#[derive(Default)]
struct Pending {
    responses: Vec<Response>,
    force_batch: bool,
    flush_scheduled: bool,
}

/// Buffer of outbound responses shared by the dispatcher loop and every
/// outstanding [`Reply`](crate::Reply).
#[derive(Clone)]
pub struct ResponseBatcher {
    pending: Arc<Mutex<Pending>>,
    channel: Arc<dyn Channel>,
    /// One token per scheduled flush, consumed by the dispatcher loop.
    turn_tx: mpsc::UnboundedSender<()>,
}

impl ResponseBatcher {
    pub fn new(channel: Arc<dyn Channel>, turn_tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending::default())),
            channel,
            turn_tx,
        }
    }

    /// Buffer a response and schedule a flush if none is pending.
    ///
    /// Never sends synchronously.
    pub fn enqueue(&self, response: Response, force_batch: bool) {
        let mut pending = self.pending.lock();
        pending.responses.push(response);
        pending.force_batch |= force_batch;

        if !pending.flush_scheduled {
            pending.flush_scheduled = true;
            if self.turn_tx.send(()).is_err() {
                debug!("Dispatcher loop stopped, response stays buffered");
            }
        }
    }

    /// Number of buffered responses.
    pub fn len(&self) -> usize {
        self.pending.lock().responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write everything buffered as one message and reset the buffer.
    pub fn flush(&self) {
        let (responses, force_batch) = {
            let mut pending = self.pending.lock();
            pending.flush_scheduled = false;
            let force_batch = std::mem::take(&mut pending.force_batch);
            (std::mem::take(&mut pending.responses), force_batch)
        };

        if responses.is_empty() {
            return;
        }

        let count = responses.len();
        let batch = force_batch || count > 1;
        let text = if batch {
            serde_json::to_string(&responses)
        } else {
            serde_json::to_string(&responses[0])
        };

        match text {
            Ok(text) => {
                debug!("Flushing {count} response(s), batch={batch}");
                self.channel.send(text);
            }
            Err(e) => error!("Failed to serialize {count} response(s): {e}"),
        }
    }
}
