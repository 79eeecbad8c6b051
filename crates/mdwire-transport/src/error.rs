/// Errors that can occur in director transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The director address string could not be parsed.
    #[error("invalid director address '{0}'")]
    InvalidAddress(String),

    /// Failed to connect to the director.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Failed to bind a local listener.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
