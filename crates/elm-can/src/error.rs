//! ELM327 Error Types

use thiserror::Error;

/// Errors that can occur while talking to an ELM327 adapter
#[derive(Debug, Error)]
pub enum ElmError {
    /// Serial port or I/O error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// The link reached end-of-file before the adapter finished a response
    #[error("Link closed while waiting for adapter output")]
    LinkClosed,

    /// Identification string does not come from an ELM327-compatible adapter
    #[error("Adapter identified as {0:?}, expected an ELM327")]
    NotAnElm327(String),

    /// Protocol code outside the adapter's protocol table
    #[error("Protocol not supported: {0}")]
    UnsupportedProtocol(String),

    /// Arbitration ID (or filter/mask value) wider than the bus allows
    #[error("CAN ID {0:#X} is out of range")]
    InvalidId(u32),

    /// A CAN record was requested while monitor mode is not active
    #[error("Adapter is not in monitor mode")]
    NotStreaming,
}

impl From<std::io::Error> for ElmError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return ElmError::LinkClosed;
        }
        ElmError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for ElmError {
    fn from(err: tokio_serial::Error) -> Self {
        ElmError::SerialError(err.to_string())
    }
}
