use thiserror::Error;

/// Errors raised by the mock camera and the discovery responder
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// Listening socket could not be bound
    #[error("Failed to bind to {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// Writing image data took longer than the data timeout
    #[error("Data write timeout after {0}ms")]
    DataTimeout(u64),

    /// Grammar or codec error
    #[error("Protocol error: {0}")]
    Protocol(#[from] phantom_core::Error),

    /// Raw frame transmission failed
    #[error("Transfer error: {0}")]
    Transfer(#[from] phantom_network::TransferError),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
