//! Error types for pipelines.

use std::any::Any;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors a pipeline can end with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline could not be built or started.
    #[error("pipeline setup failed: {message}")]
    Setup {
        /// Description of the failure.
        message: String,
    },

    /// A stage returned an error.
    #[error("pipeline failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },

    /// A stage panicked.
    #[error("pipeline panicked: {message}")]
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The pipeline thread went away without reporting.
    #[error("pipeline thread disconnected")]
    Disconnected,
}

impl PipelineError {
    /// Create a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Create a stage failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Build a panic error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }
}
