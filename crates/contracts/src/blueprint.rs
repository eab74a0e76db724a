//! CaptureBlueprint - Config Loader output
//!
//! Describes a complete capture setup: session settings, manual targets,
//! class rules, output sinks and an optional simulated scenario.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{BaselinePolicy, CaptureMode, Location, Rotation, TransformConfig};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full capture configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CaptureBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    /// Manually selected recording targets
    #[serde(default)]
    #[validate(nested)]
    pub targets: Vec<TargetConfig>,

    /// Auto-capture rules, matched in declaration order
    #[serde(default)]
    #[validate(nested)]
    pub rules: Vec<ClassRuleConfig>,

    /// Output routing for baked assets
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,

    /// Simulated scene driven by the CLI `run` command
    #[serde(default)]
    pub scenario: Option<ScenarioConfig>,
}

pub const DEFAULT_ASSET_PATH: &str = "/MocapCaptures";

/// Whether `name` can name an asset file: non-empty ASCII alphanumerics,
/// `_` and `-`
pub fn is_valid_asset_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Whether `path` is a usable asset namespace: `/Seg/Seg...` made of
/// ASCII alphanumerics, `_` and `-`
pub fn is_valid_asset_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    let rest = rest.trim_end_matches('/');
    !rest.is_empty()
        && rest.split('/').all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

/// Session-wide capture settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Sampling tick frequency (Hz)
    #[serde(default = "default_capture_rate")]
    #[validate(range(exclusive_min = 0.0))]
    pub capture_sample_rate_hz: f64,

    /// Frame rate of baked assets
    #[serde(default = "default_export_fps")]
    #[validate(range(min = 1, max = 240))]
    pub export_fps: u32,

    /// Namespace baked assets are written under
    #[serde(default = "default_asset_path")]
    #[validate(length(min = 1))]
    pub asset_path: String,

    /// Enqueue bake jobs for every recorder when the session stops
    #[serde(default = "default_true")]
    pub auto_bake_on_stop: bool,

    /// Rebase against `session_origin` instead of each target's start pose
    #[serde(default = "default_true")]
    pub preserve_starting_location: bool,

    #[serde(default)]
    pub session_origin: TransformConfig,

    #[serde(default = "default_budget")]
    #[validate(range(min = 1))]
    pub sweep_budget_per_tick: usize,

    #[serde(default = "default_budget")]
    #[validate(range(min = 1))]
    pub max_auto_capture_per_tick: usize,

    #[serde(default = "default_max_active")]
    #[validate(range(min = 1))]
    pub max_active_auto_instances: usize,

    /// Bake tick period (milliseconds)
    #[serde(default = "default_bake_interval_ms")]
    #[validate(range(min = 1))]
    pub bake_interval_ms: u64,
}

fn default_capture_rate() -> f64 {
    60.0
}

fn default_export_fps() -> u32 {
    30
}

fn default_asset_path() -> String {
    DEFAULT_ASSET_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_budget() -> usize {
    512
}

fn default_max_active() -> usize {
    2048
}

fn default_bake_interval_ms() -> u64 {
    200
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate_hz: default_capture_rate(),
            export_fps: default_export_fps(),
            asset_path: default_asset_path(),
            auto_bake_on_stop: true,
            preserve_starting_location: true,
            session_origin: TransformConfig::default(),
            sweep_budget_per_tick: default_budget(),
            max_auto_capture_per_tick: default_budget(),
            max_active_auto_instances: default_max_active(),
            bake_interval_ms: default_bake_interval_ms(),
        }
    }
}

impl SessionConfig {
    pub fn baseline_policy(&self) -> BaselinePolicy {
        if self.preserve_starting_location {
            BaselinePolicy::PreserveOrigin {
                origin: self.session_origin.to_transform(),
            }
        } else {
            BaselinePolicy::RebaseToStart
        }
    }
}

/// A manually selected recording target, resolved by actor name
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TargetConfig {
    #[validate(length(min = 1))]
    pub actor_name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Asset name override; the default is `Mocap_<actor>_<timestamp>`
    #[serde(default)]
    #[validate(length(min = 1))]
    pub output_name: Option<String>,

    #[serde(default)]
    pub capture_mode: CaptureMode,
}

/// Auto-capture rule
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClassRuleConfig {
    /// Class the actor must be (a subtype of); a rule without one never matches
    #[serde(default)]
    #[validate(length(min = 1))]
    pub actor_class: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub required_tag: Option<String>,

    #[serde(default)]
    pub auto_stop: AutoStopSettings,
}

impl Default for ClassRuleConfig {
    fn default() -> Self {
        Self {
            actor_class: None,
            enabled: true,
            required_tag: None,
            auto_stop: AutoStopSettings::default(),
        }
    }
}

/// Per-rule auto-stop policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStopSettings {
    pub stop_when_nearly_stationary: bool,

    /// Speed (units/s) under which the actor counts as stationary
    pub linear_speed_threshold: f64,

    /// How long the actor must stay stationary (seconds)
    pub stationary_hold_seconds: f64,

    pub stop_when_out_of_radius: bool,

    /// Distance from the primary subject; `<= 0` disables the check
    pub radius: f64,

    pub stop_on_hit: bool,

    pub stop_on_destroyed: bool,

    pub auto_bake_on_auto_stop: bool,
}

impl Default for AutoStopSettings {
    fn default() -> Self {
        Self {
            stop_when_nearly_stationary: true,
            linear_speed_threshold: 5.0,
            stationary_hold_seconds: 0.25,
            stop_when_out_of_radius: false,
            radius: 5000.0,
            stop_on_hit: false,
            stop_on_destroyed: true,
            auto_bake_on_auto_stop: true,
        }
    }
}

impl AutoStopSettings {
    /// Copy with every numeric threshold clamped to `>= 0` (NaN becomes 0)
    pub fn sanitized(mut self) -> Self {
        self.linear_speed_threshold = clamp_non_negative(self.linear_speed_threshold);
        self.stationary_hold_seconds = clamp_non_negative(self.stationary_hold_seconds);
        self.radius = clamp_non_negative(self.radius);
        self
    }
}

/// `max(0, v)`, mapping NaN to 0
pub fn clamp_non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    #[validate(length(min = 1))]
    pub name: String,

    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log a summary per asset
    Log,
    /// Serialized asset files (json / bincode)
    File,
    /// Biovision hierarchy files
    Bvh,
}

/// Simulated scene for offline runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Number of session ticks to run before stopping
    #[serde(default = "default_scenario_ticks")]
    pub ticks: u64,

    /// Location of the primary tracked subject
    #[serde(default)]
    pub primary_subject: Option<Location>,

    /// Bake ticks during which the external context stays active after stop
    #[serde(default)]
    pub external_context_ticks: u64,

    #[serde(default)]
    pub actors: Vec<ScenarioActor>,
}

fn default_scenario_ticks() -> u64 {
    600
}

/// Scripted actor of a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioActor {
    pub name: String,

    /// Most derived class first
    pub class_chain: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Bone table; empty means the actor has no skeleton
    #[serde(default)]
    pub bones: Vec<BoneSpec>,

    /// Tick at which the actor appears (0 = present before the session starts)
    #[serde(default)]
    pub spawn_tick: u64,

    #[serde(default)]
    pub destroy_tick: Option<u64>,

    #[serde(default)]
    pub hit_tick: Option<u64>,

    /// Tick after which the actor stops moving
    #[serde(default)]
    pub stop_moving_tick: Option<u64>,

    #[serde(default)]
    pub start: TransformConfig,

    /// Linear velocity (units/s)
    #[serde(default)]
    pub velocity: Location,

    /// Angular velocity (degrees/s)
    #[serde(default)]
    pub angular_velocity: Rotation,
}

/// Bone of a scripted skeleton
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneSpec {
    pub name: String,

    /// `-1` for the root
    #[serde(default = "default_parent")]
    pub parent: i32,

    /// Reference-pose offset from the parent bone
    #[serde(default)]
    pub offset: Location,
}

fn default_parent() -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let s = SessionConfig::default();
        assert_eq!(s.capture_sample_rate_hz, 60.0);
        assert_eq!(s.export_fps, 30);
        assert_eq!(s.asset_path, "/MocapCaptures");
        assert!(s.auto_bake_on_stop);
        assert_eq!(s.sweep_budget_per_tick, 512);
        assert_eq!(s.max_active_auto_instances, 2048);
        assert!(matches!(
            s.baseline_policy(),
            BaselinePolicy::PreserveOrigin { .. }
        ));
    }

    #[test]
    fn test_auto_stop_defaults() {
        let a = AutoStopSettings::default();
        assert!(a.stop_when_nearly_stationary);
        assert_eq!(a.linear_speed_threshold, 5.0);
        assert_eq!(a.stationary_hold_seconds, 0.25);
        assert!(!a.stop_when_out_of_radius);
        assert_eq!(a.radius, 5000.0);
        assert!(!a.stop_on_hit);
        assert!(a.stop_on_destroyed);
        assert!(a.auto_bake_on_auto_stop);
    }

    #[test]
    fn test_sanitized_clamps_thresholds() {
        let a = AutoStopSettings {
            linear_speed_threshold: -1.0,
            stationary_hold_seconds: f64::NAN,
            radius: -10.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(a.linear_speed_threshold, 0.0);
        assert_eq!(a.stationary_hold_seconds, 0.0);
        assert_eq!(a.radius, 0.0);
    }

    #[test]
    fn test_derive_validation() {
        let mut bp = CaptureBlueprint::default();
        assert!(bp.validate().is_ok());

        bp.session.export_fps = 0;
        assert!(bp.validate().is_err());

        bp.session.export_fps = 30;
        bp.targets.push(TargetConfig {
            actor_name: String::new(),
            enabled: true,
            output_name: None,
            capture_mode: CaptureMode::Skeletal,
        });
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_asset_path_rules() {
        assert!(is_valid_asset_path("/MocapCaptures"));
        assert!(is_valid_asset_path("/Game/Mocap_01/"));
        assert!(!is_valid_asset_path("MocapCaptures"));
        assert!(!is_valid_asset_path("/"));
        assert!(!is_valid_asset_path("/a//b"));
        assert!(!is_valid_asset_path("/a/../b"));
        assert!(!is_valid_asset_path("/with space"));
    }

    #[test]
    fn test_partial_auto_stop_uses_defaults() {
        let rule: ClassRuleConfig = serde_json::from_str(
            r#"{ "actor_class": "Walker", "auto_stop": { "stop_on_hit": true } }"#,
        )
        .unwrap();
        assert!(rule.enabled);
        assert!(rule.auto_stop.stop_on_hit);
        assert_eq!(rule.auto_stop.linear_speed_threshold, 5.0);
    }
}
