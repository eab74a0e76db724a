//! Session-wide settings
//!
//! Built from the `[session]` config section; every value is clamped into
//! its usable range on the way in.

use std::time::Duration;

use baker::{Resampler, DEFAULT_BAKE_INTERVAL};
use contracts::{BaselinePolicy, SessionConfig, Transform, DEFAULT_ASSET_PATH};

pub const MIN_CAPTURE_RATE_HZ: f64 = 1.0;

/// `max(1, hz)`, mapping NaN to 1
pub fn clamp_capture_rate(hz: f64) -> f64 {
    if hz.is_nan() {
        MIN_CAPTURE_RATE_HZ
    } else {
        hz.max(MIN_CAPTURE_RATE_HZ)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub capture_sample_rate_hz: f64,
    pub export_fps: u32,
    pub asset_path: String,
    pub auto_bake_on_stop: bool,
    /// Rebase against `session_origin` instead of each target's start pose
    pub preserve_starting_location: bool,
    pub session_origin: Transform,
    pub sweep_budget_per_tick: usize,
    pub max_auto_capture_per_tick: usize,
    pub max_active_auto_instances: usize,
    pub bake_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capture_sample_rate_hz: 60.0,
            export_fps: 30,
            asset_path: DEFAULT_ASSET_PATH.to_string(),
            auto_bake_on_stop: true,
            preserve_starting_location: true,
            session_origin: Transform::identity(),
            sweep_budget_per_tick: 512,
            max_auto_capture_per_tick: 512,
            max_active_auto_instances: 2048,
            bake_interval: DEFAULT_BAKE_INTERVAL,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            capture_sample_rate_hz: clamp_capture_rate(config.capture_sample_rate_hz),
            export_fps: Resampler::new(config.export_fps).export_fps(),
            asset_path: config.asset_path.clone(),
            auto_bake_on_stop: config.auto_bake_on_stop,
            preserve_starting_location: config.preserve_starting_location,
            session_origin: config.session_origin.to_transform(),
            sweep_budget_per_tick: config.sweep_budget_per_tick.max(1),
            max_auto_capture_per_tick: config.max_auto_capture_per_tick.max(1),
            max_active_auto_instances: config.max_active_auto_instances.max(1),
            bake_interval: Duration::from_millis(config.bake_interval_ms.max(1)),
        }
    }

    pub fn baseline_policy(&self) -> BaselinePolicy {
        if self.preserve_starting_location {
            BaselinePolicy::PreserveOrigin {
                origin: self.session_origin,
            }
        } else {
            BaselinePolicy::RebaseToStart
        }
    }

    /// Seconds per session tick
    pub fn sample_interval(&self) -> f64 {
        1.0 / self.capture_sample_rate_hz
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sample_interval())
    }
}
