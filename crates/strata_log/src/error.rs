//! Error types for the chunked log.

use strata_codec::CodecError;
use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur while building or reading a log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The log was already encoded and accepts no more items.
    #[error("log is sealed")]
    Sealed,

    /// An item or chunk could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// An encoded log did not have the expected layout.
    #[error("malformed log: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl LogError {
    /// Create a malformed log error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
