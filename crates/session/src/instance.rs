//! Recording slots owned by the session: manual targets and auto-capture
//! instances.

use capture_engine::Recorder;
use contracts::{ActorId, AutoStopSettings, CaptureMode};
use nalgebra::Vector3;

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    Stationary,
    OutOfRadius,
    Destroyed,
    Hit,
    /// Actor vanished without a (gated) destroy notification
    ActorGone,
    /// Recorder left the Recording state on its own
    RecorderStopped,
    SessionStopped,
}

impl StopReason {
    /// Metric / summary label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stationary => "stationary",
            Self::OutOfRadius => "out_of_radius",
            Self::Destroyed => "destroyed",
            Self::Hit => "hit",
            Self::ActorGone => "actor_gone",
            Self::RecorderStopped => "recorder_stopped",
            Self::SessionStopped => "session_stopped",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manually selected target and its recorder
#[derive(Debug)]
pub struct ManualTarget {
    pub(crate) actor: ActorId,
    pub(crate) enabled: bool,
    pub(crate) output_name: Option<String>,
    pub(crate) capture_mode: CaptureMode,
    pub(crate) recorder: Recorder,
    /// Actor vanished mid-session; the recorder is stopped but its frames
    /// are still baked when the session stops
    pub(crate) lost: bool,
}

impl ManualTarget {
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }
}

/// Live auto-capture of one rule-matched actor
#[derive(Debug)]
pub(crate) struct AutoInstance {
    pub actor: ActorId,
    pub rule_index: usize,
    /// Sanitized copy of the matching rule's auto-stop policy
    pub settings: AutoStopSettings,
    pub recorder: Recorder,
    /// Root location at the previous auto-stop evaluation
    pub last_location: Vector3<f64>,
    /// Session sample index the instance started on
    pub started_at: u64,
    pub stationary_ticks: u32,
    /// Set by destroy / hit notifications, consumed on the next tick
    pub stop_requested: Option<StopReason>,
    /// Resolved when the instance starts
    pub asset_name: String,
}

impl AutoInstance {
    /// Stationary test for one tick; `dt` is the session tick period
    ///
    /// Returns true once the actor has stayed below the speed threshold for
    /// the configured hold time.
    pub fn update_stationary(&mut self, location: Vector3<f64>, dt: f64) -> bool {
        let speed = (location - self.last_location).norm() / dt;
        self.last_location = location;

        if speed < self.settings.linear_speed_threshold {
            self.stationary_ticks += 1;
        } else {
            self.stationary_ticks = 0;
        }
        self.stationary_ticks > 0
            && self.stationary_ticks as f64 * dt + STATIONARY_EPSILON
                >= self.settings.stationary_hold_seconds
    }

    /// Squared-distance radius test; disabled for `radius <= 0`
    pub fn is_out_of_radius(&self, location: Vector3<f64>, subject: Vector3<f64>) -> bool {
        let radius = self.settings.radius;
        radius > 0.0 && (location - subject).norm_squared() > radius * radius
    }
}

/// Absorbs float noise when summing tick periods against the hold time
const STATIONARY_EPSILON: f64 = 1e-9;
