//! # Capture Engine
//!
//! Pose sampling and per-target recording.
//!
//! - [`build_descriptor`] snapshots a live bone table
//! - [`PoseSampler`] turns one evaluated pose into a rebased local [`contracts::Frame`]
//! - [`Recorder`] owns the frame buffer and the counted sampling clock

mod descriptor;
mod error;
mod recorder;
mod sampler;

pub use descriptor::build_descriptor;
pub use error::{CaptureError, Result};
pub use recorder::{CaptureHost, Recorder, RecorderConfig, RecorderState, DEFAULT_SAMPLE_RATE_HZ};
pub use sampler::{Baseline, PoseSampler};
