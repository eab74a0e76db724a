//! Baker error types

use thiserror::Error;

/// Bake-specific errors
#[derive(Debug, Error)]
pub enum BakeError {
    /// Recording holds no frames
    #[error("job '{job}' has no frames")]
    EmptyRecording { job: String },

    /// Recording was never given a skeleton descriptor
    #[error("job '{job}' has no skeleton descriptor")]
    MissingDescriptor { job: String },

    /// A frame does not match the descriptor's bone count
    #[error("job '{job}': frame {frame} has {actual} bones, descriptor has {expected}")]
    MisalignedFrame {
        job: String,
        frame: usize,
        expected: usize,
        actual: usize,
    },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BakeError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// True for jobs rejected before resampling
    pub fn is_invalid_job(&self) -> bool {
        matches!(
            self,
            Self::EmptyRecording { .. } | Self::MissingDescriptor { .. } | Self::MisalignedFrame { .. }
        )
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, BakeError>;
