//! # Actor Factory
//!
//! In-memory scene host for offline capture runs and tests.
//!
//! Responsibilities:
//! - `MockWorld`: actors, skeletons and motion behind the host capability traits
//! - `ActorFactory`: spawn scripted scenario actors and replay their events
//! - `ManualScheduler`: record timer registrations for a host-driven loop
//! - Failure injection for fail-closed capture paths

pub mod error;
pub mod factory;
pub mod scheduler;
pub mod world;

pub use contracts::{ActorId, ScenarioConfig};
pub use error::{ActorFactoryError, Result};
pub use factory::{ActorFactory, TickReport};
pub use scheduler::ManualScheduler;
pub use world::{ActorSpec, MockConfig, MockWorld, SkeletonBlueprint};
