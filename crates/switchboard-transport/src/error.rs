use std::net::AddrParseError;

/// Errors raised while setting up a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address {addr}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
