//! Switchboard — a transport-agnostic JSON-RPC 2.0 dispatcher.
//!
//! The workspace crates carry the functionality; this crate holds the demo
//! method set the binary serves.

pub mod demo;

pub use switchboard_protocol as protocol;
pub use switchboard_server as server;
pub use switchboard_transport as transport;
