//! Capture engine error types

use contracts::{ActorId, ContractError};
use thiserror::Error;

/// Recorder / sampler errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Recorder has no target actor
    #[error("recorder has no target")]
    NoTarget,

    /// Start requested while a recording is in progress
    #[error("recorder is already recording {actor_id}")]
    AlreadyRecording { actor_id: ActorId },

    /// Target has no skeletal component
    #[error("actor {actor_id} has no skeleton")]
    NoSkeleton { actor_id: ActorId },

    /// Live skeleton no longer matches the recording's descriptor
    #[error("bone count mismatch on {actor_id}: descriptor has {expected}, live skeleton has {actual}")]
    BoneCountMismatch {
        actor_id: ActorId,
        expected: usize,
        actual: usize,
    },

    /// Provider returned the wrong number of bone transforms
    #[error("transform count mismatch on {actor_id}: expected {expected}, got {actual}")]
    TransformCountMismatch {
        actor_id: ActorId,
        expected: usize,
        actual: usize,
    },

    /// Sample requested before a descriptor was built
    #[error("recorder has no skeleton descriptor")]
    MissingDescriptor,

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl CaptureError {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoTarget => "no_target",
            Self::AlreadyRecording { .. } => "already_recording",
            Self::NoSkeleton { .. } => "no_skeleton",
            Self::BoneCountMismatch { .. } => "bone_count_mismatch",
            Self::TransformCountMismatch { .. } => "transform_count_mismatch",
            Self::MissingDescriptor => "missing_descriptor",
            Self::Contract(_) => "provider",
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, CaptureError>;
