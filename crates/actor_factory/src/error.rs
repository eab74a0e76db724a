//! Actor Factory error types

use contracts::ContractError;
use thiserror::Error;

/// Actor Factory specific error
#[derive(Debug, Error)]
pub enum ActorFactoryError {
    /// Actor spawn error
    #[error("failed to spawn actor '{actor_name}': {message}")]
    SpawnFailed { actor_name: String, message: String },

    /// Scripted event references an actor that never spawned
    #[error("scenario actor '{actor_name}' is not live")]
    ActorNotLive { actor_name: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ActorFactoryError {
    /// Create spawn error
    pub fn spawn(actor_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            actor_name: actor_name.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ActorFactoryError>;
