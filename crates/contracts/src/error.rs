//! Layered error definitions
//!
//! Categorized by source: config / skeleton / scene / sink

use thiserror::Error;

use crate::ActorId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Skeleton Errors =====
    /// Bone table is structurally invalid
    #[error("invalid skeleton: {message}")]
    InvalidSkeleton { message: String },

    /// Actor has no skeletal component
    #[error("actor {actor_id} has no skeleton")]
    SkeletonUnavailable { actor_id: ActorId },

    /// Bone index outside the live skeleton
    #[error("bone index {bone} out of range for actor {actor_id} ({bone_count} bones)")]
    BoneOutOfRange {
        actor_id: ActorId,
        bone: usize,
        bone_count: usize,
    },

    // ===== Scene Errors =====
    /// Actor no longer exists in the scene
    #[error("actor not found: {actor_id}")]
    ActorNotFound { actor_id: ActorId },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create skeleton validation error
    pub fn invalid_skeleton(message: impl Into<String>) -> Self {
        Self::InvalidSkeleton {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
