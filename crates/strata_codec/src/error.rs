//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
///
/// Every decoding error is a format error: the peer is trusted and
/// co-versioned, so none of these are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No decoder is registered for the byte at the cursor.
    #[error("unknown tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// The offending byte.
        tag: u8,
        /// Position of the byte in the buffer.
        offset: usize,
    },

    /// Integer literal is not canonical or does not fit in an `i64`.
    #[error("malformed integer at offset {offset}: {message}")]
    MalformedInteger {
        /// Position of the integer tag.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// Length prefix is not a canonical decimal number.
    #[error("malformed length at offset {offset}: {message}")]
    MalformedLength {
        /// Position of the length prefix.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    UnexpectedEof {
        /// Position where more input was needed.
        offset: usize,
        /// Number of bytes that were needed.
        needed: usize,
    },

    /// A complete top-level value was followed by more bytes.
    #[error("trailing bytes after value: consumed {consumed} of {total}")]
    TrailingBytes {
        /// Bytes consumed by the value.
        consumed: usize,
        /// Total buffer length.
        total: usize,
    },

    /// Boolean payload was neither `t` nor `f`.
    #[error("malformed boolean at offset {offset}")]
    MalformedBool {
        /// Position of the boolean tag.
        offset: usize,
    },

    /// Invalid UTF-8 in a unicode string.
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 {
        /// Position of the string tag.
        offset: usize,
    },

    /// Embedded JSON document could not be parsed or produced.
    #[error("embedded JSON error: {message}")]
    Json {
        /// Description from the JSON parser.
        message: String,
    },

    /// Containers nested deeper than the decoder allows.
    #[error("nesting depth exceeds {max}")]
    DepthExceeded {
        /// The configured maximum.
        max: usize,
    },

    /// Compressed payload could not be handled.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),
}

impl CodecError {
    /// Create a malformed integer error.
    pub fn malformed_integer(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedInteger {
            offset,
            message: message.into(),
        }
    }

    /// Create a malformed length error.
    pub fn malformed_length(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedLength {
            offset,
            message: message.into(),
        }
    }

    /// Create an embedded JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::json(err.to_string())
    }
}

/// Errors raised by the compression layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// The payload starts with neither a zlib header nor an LZ4 frame magic.
    #[error("unrecognized compression preamble {preamble:02x?}")]
    UnknownPreamble {
        /// The first bytes of the payload (at most four).
        preamble: Vec<u8>,
    },

    /// The selected codec rejected the payload.
    #[error("{codec} codec failed: {message}")]
    CodecFailed {
        /// Codec name.
        codec: &'static str,
        /// Description of the failure.
        message: String,
    },
}

impl CompressionError {
    /// Create a codec failure error.
    pub fn codec_failed(codec: &'static str, message: impl Into<String>) -> Self {
        Self::CodecFailed {
            codec,
            message: message.into(),
        }
    }
}
