//! # Contracts
//!
//! Shared data structures and host-facing traits of the capture pipeline.
//! Every other crate depends on this one; it depends on none of them.
//!
//! ## Time Model
//! - Frame timestamps are counted sampling periods (`k / sample_rate_hz`), in seconds
//! - The session sample counter is the shared timeline for all recorders of a session

mod actor;
mod bake;
mod blueprint;
mod error;
mod event;
mod frame;
mod provider;
mod sink;
mod skeleton;
mod transform;

pub use actor::*;
pub use bake::*;
pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use frame::*;
pub use provider::*;
pub use sink::*;
pub use skeleton::SkeletonDescriptor;
pub use transform::*;

pub use validator::Validate;
