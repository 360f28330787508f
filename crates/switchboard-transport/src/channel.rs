//! The channel abstraction and an in-memory implementation.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Callback invoked once per inbound message.
pub type MessageListener = Box<dyn Fn(String) + Send + Sync>;

/// A bidirectional text message channel.
///
/// A channel holds at most one listener. Dropping the listener signals the
/// end of the inbound stream to whoever subscribed.
pub trait Channel: Send + Sync + 'static {
    /// Install the listener for inbound messages, replacing any previous one.
    fn subscribe(&self, listener: MessageListener);

    /// Send one outbound message.
    fn send(&self, text: String);
}

/// In-process channel. Inbound text is pushed with [`MemoryChannel::deliver`];
/// outbound text is read from the paired [`MemoryPeer`].
#[derive(Clone)]
pub struct MemoryChannel {
    listener: Arc<Mutex<Option<MessageListener>>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

/// Receiving end of everything a [`MemoryChannel`] sends.
pub struct MemoryPeer {
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryChannel {
    pub fn new() -> (Self, MemoryPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let channel = Self {
            listener: Arc::new(Mutex::new(None)),
            outbound_tx,
        };
        (channel, MemoryPeer { outbound_rx })
    }

    /// Deliver an inbound message. Returns `false` if nothing is subscribed.
    pub fn deliver(&self, text: impl Into<String>) -> bool {
        match self.listener.lock().as_ref() {
            Some(listener) => {
                listener(text.into());
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Drop the listener, ending the subscriber's inbound stream.
    pub fn close(&self) {
        self.listener.lock().take();
    }
}

impl Channel for MemoryChannel {
    fn subscribe(&self, listener: MessageListener) {
        *self.listener.lock() = Some(listener);
    }

    fn send(&self, text: String) {
        if self.outbound_tx.send(text).is_err() {
            debug!("Memory peer dropped, discarding outbound message");
        }
    }
}

impl MemoryPeer {
    /// Wait for the next outbound message.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// Wait for the next outbound message and parse it as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let text = self.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Take an already-sent message without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound_rx.try_recv().ok()
    }
}
