//! JSON-RPC 2.0 error objects and standard error codes.

use serde::{Deserialize, Serialize};

/// Standard JSON-RPC 2.0 error codes.
///
/// The dispatcher itself only ever emits the first four plus `InternalError`;
/// the rest are available to handlers replying with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,

    /// Implementation-defined server error (-32000).
    ServerError,

    Custom(i64),
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            c => Self::Custom(c),
        }
    }

    /// Canonical message for the standard codes.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError => "Server error",
            Self::Custom(_) => "Error",
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("JSON-RPC error [{code}]: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    fn standard(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn parse_error() -> Self {
        Self::standard(ErrorCode::ParseError)
    }

    pub fn invalid_request() -> Self {
        Self::standard(ErrorCode::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::standard(ErrorCode::MethodNotFound)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal() -> Self {
        Self::standard(ErrorCode::InternalError)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_code(self.code)
    }
}
