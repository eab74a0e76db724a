//! Host capabilities consumed by the capture pipeline
//!
//! The recorder and session never own the scene; every operation receives
//! the host by reference and talks to it through these traits.

use nalgebra::Vector3;
use std::time::Duration;

use crate::{ActorId, ActorInfo, ContractError, Transform};

/// Read access to a live skeletal mesh
pub trait SkeletonProvider {
    /// Whether the actor carries a skeletal component
    fn has_skeleton(&self, actor: ActorId) -> bool;

    fn bone_count(&self, actor: ActorId) -> Result<usize, ContractError>;

    fn bone_name(&self, actor: ActorId, bone: usize) -> Result<String, ContractError>;

    /// `-1` for roots
    fn parent_index(&self, actor: ActorId, bone: usize) -> Result<i32, ContractError>;

    /// Force a full pose evaluation so the following reads are current
    fn refresh_pose(&self, actor: ActorId) -> Result<(), ContractError>;

    /// Per-bone transforms in component space, in bone-table order
    fn component_space_transforms(&self, actor: ActorId) -> Result<Vec<Transform>, ContractError>;

    /// Component-to-world transform of the skeletal component
    fn component_to_world(&self, actor: ActorId) -> Result<Transform, ContractError>;
}

/// Read access to the scene's actors
pub trait SceneProvider {
    fn actor_exists(&self, actor: ActorId) -> bool;

    fn actor_info(&self, actor: ActorId) -> Option<ActorInfo>;

    /// World transform of the actor's root
    fn actor_transform(&self, actor: ActorId) -> Result<Transform, ContractError>;

    /// Snapshot of every live actor, in a stable order
    fn live_actors(&self) -> Vec<ActorId>;

    /// Location of the primary tracked subject (e.g. the player), if any
    fn primary_subject_location(&self) -> Option<Vector3<f64>>;

    /// True while a dependent context (e.g. a play-in-editor run) is active
    fn is_external_context_active(&self) -> bool;
}

/// Handle for a registered repeating timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Repeating timer registration
///
/// The scheduler only records intent; the host decides when to call back
/// into the session's `tick` / `tick_bake`.
pub trait Scheduler {
    fn schedule_repeating(&mut self, interval: Duration) -> TimerHandle;

    /// Cancelling an unknown or already cancelled handle is a no-op
    fn cancel(&mut self, handle: TimerHandle);
}
