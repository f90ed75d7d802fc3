//! Error types for the worker runtime.

use strata_codec::CodecError;
use strata_log::LogError;
use strata_pipeline::PipelineError;
use strata_protocol::ProtocolError;
use strata_segment::SegmentError;
use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that end a worker run.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Channel or framing failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Encoding or decoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Event log failure.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// A pipeline could not be started.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// One or more pipelines failed during a chain run.
    #[error("{} pipeline(s) failed: {}", .failed.len(), .failed.join(", "))]
    PipelinesFailed {
        /// Names of the failed pipelines.
        failed: Vec<String>,
    },

    /// Segmented model failure.
    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),

    /// Reading an input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// `params.type` names no known mode.
    #[error("unknown type: {mode}")]
    UnknownMode {
        /// The requested mode.
        mode: String,
    },

    /// A profile or event entry has the wrong shape.
    #[error("malformed entry: {message}")]
    Entry {
        /// Description of the problem.
        message: String,
    },
}

impl WorkerError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a malformed-entry error.
    pub fn entry(message: impl Into<String>) -> Self {
        Self::Entry {
            message: message.into(),
        }
    }
}
