//! WebSocket transport server using Axum.
//!
//! Handles HTTP upgrade to WebSocket and hands every accepted connection to a
//! [`ConnectionHandler`] as a [`WsChannel`]. Text frames are inbound
//! messages; [`Channel::send`] becomes an outbound text frame.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, MessageListener};
use crate::error::TransportError;

/// Called once per accepted WebSocket connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn on_connect(&self, channel: WsChannel);
}

impl<F> ConnectionHandler for F
where
    F: Fn(WsChannel) + Send + Sync + 'static,
{
    fn on_connect(&self, channel: WsChannel) {
        self(channel)
    }
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
    /// Enable verbose connection logging
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7070,
            hostname: "127.0.0.1".into(),
            max_connections: Some(32),
            verbose_logging: false,
        }
    }
}

/// One WebSocket connection seen as a [`Channel`].
#[derive(Clone)]
pub struct WsChannel {
    client_id: Arc<str>,
    listener: Arc<Mutex<Option<MessageListener>>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl WsChannel {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn deliver(&self, text: String) {
        if let Some(listener) = self.listener.lock().as_ref() {
            listener(text);
        }
    }

    fn close(&self) {
        self.listener.lock().take();
    }
}

impl Channel for WsChannel {
    fn subscribe(&self, listener: MessageListener) {
        *self.listener.lock() = Some(listener);
    }

    fn send(&self, text: String) {
        if self.outbound_tx.send(text).is_err() {
            debug!("Client {} gone, discarding outbound message", self.client_id);
        }
    }
}

/// Shared state for the transport server.
struct AppState {
    handler: Arc<dyn ConnectionHandler>,
    config: TransportConfig,
    /// Connected client count (for health check)
    client_count: Arc<AtomicUsize>,
}

/// The transport server — accepts WebSocket connections.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Bind and start serving. Returns once the listener is bound.
    pub async fn start<H: ConnectionHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let state = Arc::new(AppState {
            handler: Arc::new(handler),
            config: config.clone(),
            client_count: Arc::new(AtomicUsize::new(0)),
        });

        let app = Router::new()
            .route("/ws", get(ws_upgrade_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        let addr_text = format!("{}:{}", config.hostname, config.port);
        let addr: SocketAddr = addr_text.parse().map_err(|source| TransportError::InvalidAddress {
            addr: addr_text.clone(),
            source,
        })?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("Switchboard listening on ws://{}:{}/ws", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
            {
                error!("Transport server error: {e}");
            }
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Switchboard transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    if let Some(max) = state.config.max_connections {
        let current = state.client_count.load(Ordering::Relaxed);
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
        .into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(Ordering::Relaxed),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    state.client_count.fetch_add(1, Ordering::Relaxed);

    let client_id = uuid::Uuid::new_v4().to_string();
    if state.config.verbose_logging {
        info!("Client connected: {client_id}");
    } else {
        debug!("Client connected: {client_id}");
    }

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let channel = WsChannel {
        client_id: client_id.as_str().into(),
        listener: Arc::new(Mutex::new(None)),
        outbound_tx,
    };
    state.handler.on_connect(channel.clone());

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        channel.deliver(text.to_string());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client disconnected: {client_id}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {client_id}: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            Some(text) = outbound_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    error!("Failed to send to {client_id}: {e}");
                    break;
                }
            }
        }
    }

    channel.close();
    state.client_count.fetch_sub(1, Ordering::Relaxed);
    info!("Client disconnected: {client_id} (total: {})",
        state.client_count.load(Ordering::Relaxed));
}
