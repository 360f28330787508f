//! Switchboard Server — routes JSON-RPC requests to registered handlers.
//!
//! A [`Dispatcher`] attaches to one channel, owns the method table for it,
//! and answers through a [`ResponseBatcher`] that writes each inbound
//! message's responses in a single outbound message.

pub mod batcher;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod reply;

pub use batcher::ResponseBatcher;
pub use dispatcher::Dispatcher;
pub use error::HandlerError;
pub use registry::{Handler, MethodRegistry};
pub use reply::Reply;
