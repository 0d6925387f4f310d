//! Error types for walog.

use std::io;
use thiserror::Error;

/// Result type alias for walog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for log operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Segment header is shorter than the fixed header size.
    #[error("Invalid segment header size: {len} bytes")]
    InvalidHeaderSize { len: usize },

    /// Segment header checksum does not match its contents.
    #[error("Invalid segment header checksum: expected {expected:#x}, got {actual:#x}")]
    InvalidHeaderChecksum { expected: u32, actual: u32 },

    /// Data corruption detected.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Record CRC checksum mismatch.
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// Recovery found no checkpoint record in any segment.
    #[error("No checkpoint record found in the log")]
    NoCheckpoint,

    /// A segment filename does not parse to an index.
    #[error("Bad segment name: {0}")]
    BadSegmentName(String),

    /// Record is too large to frame.
    #[error("Record too large: {size} bytes")]
    RecordTooLarge { size: usize },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The log has been closed.
    #[error("Log is closed")]
    WalClosed,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Check if this error indicates corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Corruption(_)
                | Error::CrcMismatch { .. }
                | Error::InvalidHeaderSize { .. }
                | Error::InvalidHeaderChecksum { .. }
        )
    }
}
