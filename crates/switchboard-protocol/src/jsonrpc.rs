//! JSON-RPC 2.0 base types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request parameters as received on the wire (array, object, or absent).
pub type Params = Option<Value>;

/// JSON-RPC 2.0 request ID — either a string or a number.
///
/// Numbers are kept as `serde_json::Number` so fractional ids echo back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(serde_json::Number),
}

impl RequestId {
    /// Returns the id when `value` makes its request a call.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Exactly one of `result` / `error`, flattened into the response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(RpcError),
}

impl From<Result<Value, RpcError>> for Outcome {
    fn from(result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self::Result(value),
            Err(error) => Self::Error(error),
        }
    }
}

/// JSON-RPC 2.0 response.
///
/// `id` is a raw JSON value: `null` for malformed requests, the request's id
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub id: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper constructors
// ─────────────────────────────────────────────────────────────────────────────

impl Response {
    pub fn new(id: Value, outcome: Outcome) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            outcome,
            id,
        }
    }

    pub fn success(id: &RequestId, result: Value) -> Self {
        Self::new(id.to_value(), Outcome::Result(result))
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self::new(id, Outcome::Error(error))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    pub fn error_object(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Error(e) => Some(e),
            Outcome::Result(_) => None,
        }
    }
}
