use switchboard_protocol::RpcError;

/// Failure signalled by a handler while it is being invoked.
///
/// For a call this becomes an Internal Error response; for a notification it
/// is dropped.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
