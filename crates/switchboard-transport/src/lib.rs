//! Switchboard Transport Layer
//!
//! Message channels the dispatcher can be attached to:
//! - `MemoryChannel` for tests and in-process embedding
//! - `LineChannel` for newline-delimited JSON over stdio or any byte stream
//! - `TransportServer` serving one `WsChannel` per WebSocket connection
//!
//! The dispatcher only sees the `Channel` trait.

pub mod channel;
pub mod error;
pub mod server;
pub mod stdio;

pub use channel::{Channel, MemoryChannel, MemoryPeer, MessageListener};
pub use error::TransportError;
pub use server::{ConnectionHandler, TransportConfig, TransportServer, WsChannel};
pub use stdio::LineChannel;
