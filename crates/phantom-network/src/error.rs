use thiserror::Error;

/// Errors that can occur during control session operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client is not connected to a camera
    #[error("Not connected to camera")]
    NotConnected,

    /// Connection could not be established (timeout or refusal)
    #[error("Connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    /// Read operation timed out
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// An image was requested before the data channel was started
    #[error("Data channel not started")]
    DataChannelNotStarted,

    /// Grammar, codec or camera-reported error
    #[error("Protocol error: {0}")]
    Protocol(#[from] phantom_core::Error),

    /// Image data could not be received
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Reason carried by an `ERR:` reply, if this error is one.
    pub fn command_reason(&self) -> Option<&str> {
        match self {
            ClientError::Protocol(phantom_core::Error::Command { reason }) => Some(reason),
            _ => None,
        }
    }
}

/// Errors raised by the data channel backends and the raw frame sender
#[derive(Debug, Error)]
pub enum TransferError {
    /// Listener or raw socket could not be opened
    #[error("Failed to bind {target}: {reason}")]
    Bind { target: String, reason: String },

    /// Operation requires a started receiver
    #[error("Data receiver not started")]
    NotStarted,

    /// Receiver was stopped before the transfer completed
    #[error("Data receiver stopped")]
    Stopped,

    /// Peer closed the stream with more bytes missing than tolerated
    #[error("Transfer incomplete: received {received} of {expected} bytes")]
    Incomplete { received: usize, expected: usize },

    /// Frame layout cannot carry any payload
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Raw Ethernet is not available on this platform
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
