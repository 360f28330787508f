//! Switchboard dispatcher — classifies inbound messages and routes requests
//! to registered handlers.

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use futures_util::FutureExt;
use serde_json::Value;
use switchboard_protocol::{Envelope, Inbound, Params, Response, RpcError};
use switchboard_transport::Channel;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::batcher::ResponseBatcher;
use crate::error::HandlerError;
use crate::registry::MethodRegistry;
use crate::reply::Reply;

/// Handle to a dispatcher attached to one channel.
///
/// Cloning is cheap; all clones share the registration table and the
/// response buffer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    registry: MethodRegistry,
    batcher: ResponseBatcher,
    closed_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    /// Subscribe to `channel` and start the dispatch loop.
    ///
    /// Must be called within a tokio runtime.
    pub fn attach<C: Channel>(channel: C) -> Self {
        Self::attach_with(channel, |_| {})
    }

    /// Like [`Dispatcher::attach`], running `setup` (typically registrations)
    /// before the subscription is installed.
    pub fn attach_with<C, F>(channel: C, setup: F) -> Self
    where
        C: Channel,
        F: FnOnce(&Dispatcher),
    {
        let channel: Arc<dyn Channel> = Arc::new(channel);
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let (closed_tx, closed_rx) = watch::channel(false);

        let dispatcher = Self {
            inner: Arc::new(Inner {
                registry: MethodRegistry::new(),
                batcher: ResponseBatcher::new(channel.clone(), turn_tx),
                closed_rx,
            }),
        };
        setup(&dispatcher);

        channel.subscribe(Box::new(move |text| {
            let _ = inbound_tx.send(text);
        }));
        tokio::spawn(dispatcher.clone().run(inbound_rx, turn_rx, closed_tx));

        dispatcher
    }

    /// Register a handler. Registering the same name again appends; every
    /// handler runs, in registration order.
    ///
    /// A panic while handling a notification is dropped without a response,
    /// and the panic hook does not report it.
    pub fn register<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Params, Option<Reply>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.registry.register(method.into(), Arc::new(handler));
    }

    /// Register an async handler. Calls are answered with the future's
    /// output; for notifications the output is discarded. A panic inside the
    /// future answers a call with Internal Error.
    pub fn register_async<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        self.register(method, move |params, reply| {
            let task = AssertUnwindSafe(handler(params)).catch_unwind();
            tokio::spawn(async move {
                let outcome = task.await.unwrap_or_else(|_| Err(RpcError::internal()));
                if let Some(reply) = reply {
                    reply.send(outcome);
                }
            });
            Ok(())
        });
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        self.inner.registry.methods()
    }

    pub fn handler_count(&self, method: &str) -> usize {
        self.inner.registry.handler_count(method)
    }

    /// Resolves once the channel has dropped the subscription and the final
    /// flush is done.
    pub async fn closed(&self) {
        let mut closed_rx = self.inner.closed_rx.clone();
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch loop
    // ─────────────────────────────────────────────────────────────────────

    async fn run(
        self,
        mut inbound_rx: mpsc::UnboundedReceiver<String>,
        mut turn_rx: mpsc::UnboundedReceiver<()>,
        closed_tx: watch::Sender<bool>,
    ) {
        loop {
            tokio::select! {
                // Scheduled flushes run before the next inbound message.
                biased;
                Some(()) = turn_rx.recv() => self.inner.batcher.flush(),
                message = inbound_rx.recv() => match message {
                    Some(text) => self.on_message(&text),
                    None => break,
                },
            }
        }

        self.inner.batcher.flush();
        debug!("Dispatcher loop finished");
        let _ = closed_tx.send(true);
    }

    fn on_message(&self, text: &str) {
        match Inbound::parse(text) {
            Inbound::Unparseable => {
                debug!("Inbound message is not valid JSON");
                self.enqueue_error(Value::Null, RpcError::parse_error(), false);
            }
            Inbound::EmptyBatch => {
                self.enqueue_error(Value::Null, RpcError::invalid_request(), false);
            }
            Inbound::Batch(requests) => {
                debug!("Dispatching batch of {} request(s)", requests.len());
                for request in requests {
                    self.handle_request(request, true);
                }
            }
            Inbound::Single(request) => self.handle_request(request, false),
        }
    }

    fn handle_request(&self, request: Value, force_batch: bool) {
        // The id of a malformed request is not echoed.
        let Some(envelope) = Envelope::from_value(request) else {
            self.enqueue_error(Value::Null, RpcError::invalid_request(), force_batch);
            return;
        };

        let Some(handlers) = self.inner.registry.lookup(&envelope.method) else {
            debug!("Method not found: {}", envelope.method);
            self.enqueue_error(envelope.id, RpcError::method_not_found(), force_batch);
            return;
        };

        let reply = envelope
            .call_id()
            .map(|id| Reply::new(id, force_batch, self.inner.batcher.clone()));

        if reply.is_none() {
            install_quiet_panic_hook();
        }

        for handler in handlers {
            let params = envelope.params.clone();
            let invoke = || {
                let _quiet = reply.is_none().then(QuietPanics::enter);
                handler(params, reply.clone())
            };
            let failure = match panic::catch_unwind(AssertUnwindSafe(invoke)) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            // Notification failures are swallowed.
            if let Some(reply) = &reply {
                warn!("Handler for {} failed: {failure}", envelope.method);
                self.enqueue_error(reply.id().to_value(), RpcError::internal(), force_batch);
            }
        }
    }

    fn enqueue_error(&self, id: Value, error: RpcError, force_batch: bool) {
        self.inner.batcher.enqueue(Response::error(id, error), force_batch);
    }
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Wrap the current panic hook so it stays silent while a notification
/// handler runs on this thread.
fn install_quiet_panic_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET_PANICS.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread quiet until dropped, including during unwinding.
struct QuietPanics {
    was_quiet: bool,
}

impl QuietPanics {
    fn enter() -> Self {
        Self {
            was_quiet: QUIET_PANICS.with(|quiet| quiet.replace(true)),
        }
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        QUIET_PANICS.with(|quiet| quiet.set(self.was_quiet));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
