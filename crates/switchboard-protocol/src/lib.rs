//! Switchboard protocol types.
//!
//! JSON-RPC 2.0 wire types shared by the dispatcher and its transports:
//! request ids, responses, error objects and codes, and the classification
//! of inbound message text.

pub mod error;
pub mod inbound;
pub mod jsonrpc;

pub use error::{ErrorCode, RpcError};
pub use inbound::{Envelope, Inbound};
pub use jsonrpc::{JSONRPC_VERSION, Outcome, Params, RequestId, Response};
