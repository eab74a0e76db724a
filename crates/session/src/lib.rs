//! # Session
//!
//! Drives every recorder of a capture session from one sampling tick:
//! manual targets, rule-based auto-capture with auto-stop, and the hand-off
//! of finished recordings to the bake queue.
//!
//! ## Usage
//!
//! ```ignore
//! let mut session = SessionManager::from_blueprint(&blueprint, scheduler);
//! world.attach_events(session.event_sender());
//!
//! session.start_session(&world)?;
//! // on every sampling timer fire
//! session.tick(&world);
//! // later
//! session.stop_session(&world);
//! while session.is_baking() {
//!     session.tick_bake(&world, &mut sinks).await;
//! }
//! ```

mod error;
mod instance;
mod manager;
mod settings;

pub use error::{Result, SessionError};
pub use instance::{ManualTarget, StopReason};
pub use manager::{SessionManager, SessionState, SessionTickReport};
pub use settings::{clamp_capture_rate, SessionSettings, MIN_CAPTURE_RATE_HZ};
