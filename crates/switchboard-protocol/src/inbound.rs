//! Classification of inbound message text.
//!
//! An inbound message is parsed once into an [`Inbound`] shape; each request
//! value inside it is then read as an [`Envelope`]. Neither step inspects the
//! `jsonrpc` member.

use serde_json::Value;

use crate::jsonrpc::{Params, RequestId};

/// Shape of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The text is not valid JSON.
    Unparseable,
    /// `[]` — reported as a single invalid request.
    EmptyBatch,
    /// A non-empty array; every element is handled on its own.
    Batch(Vec<Value>),
    /// Any other JSON value.
    Single(Value),
}

impl Inbound {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Err(_) => Self::Unparseable,
            Ok(Value::Array(items)) if items.is_empty() => Self::EmptyBatch,
            Ok(Value::Array(items)) => Self::Batch(items),
            Ok(value) => Self::Single(value),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}

/// A request value that carries a string `method`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub method: String,
    pub params: Params,
    /// Raw `id` member, `null` when absent.
    pub id: Value,
}

impl Envelope {
    /// Reads a request value. Returns `None` when there is no string `method`,
    /// which includes every non-object value.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };
        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return None,
        };
        Some(Self {
            method,
            params: object.remove("params"),
            id: object.remove("id").unwrap_or(Value::Null),
        })
    }

    /// The id to reply to, present only for calls.
    pub fn call_id(&self) -> Option<RequestId> {
        RequestId::from_value(&self.id)
    }

    pub fn is_notification(&self) -> bool {
        self.call_id().is_none()
    }
}
