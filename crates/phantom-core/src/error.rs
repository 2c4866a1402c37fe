use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Grammar errors
    #[error("Protocol syntax error: {message} at '{fragment}'")]
    ProtocolSyntax { message: String, fragment: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Line exceeds maximum length: {size} > {max_size}")]
    LineTooLong { size: usize, max_size: usize },

    #[error("Invalid UTF-8 in control stream")]
    InvalidEncoding,

    // Peer-reported errors
    #[error("Camera rejected command: {reason}")]
    Command { reason: String },

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    // Codec errors
    #[error("Unknown transfer format: {0}")]
    UnknownFormat(String),

    #[error("{format} payload length mismatch: expected {expected} bytes, got {actual}")]
    CodecLength {
        format: String,
        expected: usize,
        actual: usize,
    },

    #[error("Payload of a {width}x{height} image in {format} does not fit in memory")]
    ImageTooLarge {
        width: u32,
        height: u32,
        format: String,
    },

    #[error("Pixel count {actual} does not match resolution {width}x{height}")]
    PixelCount {
        width: u32,
        height: u32,
        actual: usize,
    },

    // Addressing errors
    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("Connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a grammar failure at `fragment`.
    pub fn syntax(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Error::ProtocolSyntax {
            message: message.into(),
            fragment: fragment.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
