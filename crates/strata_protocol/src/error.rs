//! Error types for the worker channel.

use std::io;

use strata_codec::CodecError;
use thiserror::Error;

/// Result type for channel operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while talking to the host.
///
/// All of them are fatal: the stream has no resynchronization point, so a
/// caller that sees one should report it and exit.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A reply body could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A reply frame violated the framing rules.
    #[error("frame error: {message}")]
    Frame {
        /// Description of the problem.
        message: String,
    },

    /// The host did not open the session with the expected greeting.
    #[error("invalid initial reply ({received})")]
    Handshake {
        /// What was received instead, lossily decoded.
        received: String,
    },

    /// A reply decoded fine but did not have the expected shape.
    #[error("unexpected reply to {command}: {message}")]
    UnexpectedReply {
        /// Command the reply belongs to.
        command: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl ProtocolError {
    /// Create a frame error.
    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Create an unexpected reply error.
    pub fn unexpected(command: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            command,
            message: message.into(),
        }
    }

    /// Map a short read to a frame error, passing other I/O errors through.
    pub(crate) fn from_read(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::frame(format!("stream ended inside {what}"))
        } else {
            Self::Io(err)
        }
    }
}
