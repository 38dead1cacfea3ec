//! Error types for APDU framing and card transports

/// Result type for APDU core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport error type
///
/// Raised by [`CardTransport`](crate::CardTransport) implementations. Every
/// variant is fatal to the operation in flight; retrying is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the device
    #[error("Failed to connect to device")]
    Connection,

    /// Failed to transmit data
    #[error("Failed to transmit data")]
    Transmission,

    /// Device error
    #[error("Device error")]
    Device,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// The connection was torn down by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}

/// Core error type for APDU framing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response shorter than the two status bytes
    #[error("Incomplete response: {0} bytes")]
    IncompleteResponse(usize),

    /// Command payload does not fit a short APDU
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),
}
