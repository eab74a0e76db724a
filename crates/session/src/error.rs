//! Session error types

use capture_engine::CaptureError;
use contracts::{ActorId, ContractError};
use thiserror::Error;

/// Configuration-time failures surfaced to the caller
///
/// Runtime capture problems (vanished actors, misaligned samples) are logged
/// by the session and never reach this type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation needs a stopped session
    #[error("session is already recording")]
    AlreadyRecording,

    #[error("actor {actor_id} is already a capture target")]
    DuplicateTarget { actor_id: ActorId },

    #[error("actor {actor_id} not found")]
    ActorNotFound { actor_id: ActorId },

    /// Name lookup found no live actor
    #[error("no live actor named '{name}'")]
    UnknownActor { name: String },

    #[error("actor {actor_id} has no skeleton")]
    NoSkeleton { actor_id: ActorId },

    #[error("target index {index} out of range ({len} targets)")]
    TargetIndex { index: usize, len: usize },

    #[error("rule index {index} out of range ({len} rules)")]
    RuleIndex { index: usize, len: usize },

    #[error("invalid asset path '{path}'")]
    InvalidAssetPath { path: String },

    /// Output name override that is not a plain asset name
    #[error("invalid output name '{name}'")]
    InvalidOutputName { name: String },

    /// Wrapped CaptureError
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SessionError {
    pub fn unknown_actor(name: impl Into<String>) -> Self {
        Self::UnknownActor { name: name.into() }
    }

    pub fn invalid_asset_path(path: impl Into<String>) -> Self {
        Self::InvalidAssetPath { path: path.into() }
    }

    pub fn invalid_output_name(name: impl Into<String>) -> Self {
        Self::InvalidOutputName { name: name.into() }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SessionError>;
