//! Error types for segmented views.

use strata_codec::CodecError;
use thiserror::Error;

/// Result type for segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors raised by indexes and segmented views.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// A segmented view needs at least one segment.
    #[error("no segments given")]
    NoSegments,

    /// The query cannot be evaluated.
    #[error("invalid query: {message}")]
    Query {
        /// Description of the problem.
        message: String,
    },

    /// An encoded index could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// An encoded index decoded to the wrong shape.
    #[error("malformed index: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl SegmentError {
    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a malformed-index error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
