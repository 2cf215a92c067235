//! Error types for avenc

use thiserror::Error;

/// Result type alias for avenc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for avenc operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed session configuration, rejected before any allocation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Encoder context allocation or open failure
    #[error("Failed to open encoder: {0}")]
    Open(String),

    /// Odd dimensions, mismatched geometry or unsupported pixel format
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// The encoder rejected a frame (or the end-of-stream signal)
    #[error("Encoder rejected frame: {0}")]
    SendFailed(String),

    /// Draining the encoder failed for a reason other than not-ready or end-of-stream
    #[error("Encoder drain failed: {0}")]
    ReceiveFailed(String),

    /// Operation invoked outside its valid session state
    #[error("Invalid session state: {0}")]
    State(String),

    /// Presentation timestamp went backwards
    #[error("Timestamp {got} is lower than previous timestamp {previous}")]
    InvalidTimestamp { previous: i64, got: i64 },

    /// Codec is not compiled in or not known
    #[error("Codec unavailable: {0}")]
    CodecUnavailable(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error closes the session it was raised from
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Conversion(_) | Error::SendFailed(_) | Error::ReceiveFailed(_)
        )
    }
}

/// Error code for FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum ErrorCode {
    /// Success
    Ok = 0,
    /// Invalid configuration or argument
    InvalidConfig = 1,
    /// Encoder could not be opened
    OpenFailed = 2,
    /// Pixel conversion failed
    ConversionFailed = 3,
    /// Encoder rejected a frame
    SendFailed = 4,
    /// Encoder drain failed
    ReceiveFailed = 5,
    /// Operation not valid in the current state
    InvalidState = 6,
    /// Codec not available
    CodecUnavailable = 7,
    /// I/O error
    IoError = 8,
    /// Timestamp lower than the previous frame's
    InvalidTimestamp = 9,
}

impl From<&Error> for ErrorCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) => ErrorCode::InvalidConfig,
            Error::Open(_) => ErrorCode::OpenFailed,
            Error::Conversion(_) => ErrorCode::ConversionFailed,
            Error::SendFailed(_) => ErrorCode::SendFailed,
            Error::ReceiveFailed(_) => ErrorCode::ReceiveFailed,
            Error::State(_) => ErrorCode::InvalidState,
            Error::InvalidTimestamp { .. } => ErrorCode::InvalidTimestamp,
            Error::CodecUnavailable(_) => ErrorCode::CodecUnavailable,
            Error::Io(_) => ErrorCode::IoError,
        }
    }
}
