//! Recorded samples and detached recordings

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{SkeletonDescriptor, Transform};

/// One captured pose
///
/// `translations[i]` / `rotations[i]` are bone `i`'s local transform (the root
/// keeps its rebased world transform). Both arrays always have the length of
/// the descriptor the frame was captured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Seconds since the recording started (counted, not measured)
    pub time: f64,

    pub translations: Vec<Vector3<f64>>,

    pub rotations: Vec<UnitQuaternion<f64>>,

    /// Rebased world-space head/tail per bone, for debug drawing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<FrameDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    pub head_world: Vec<Vector3<f64>>,
    pub tail_world: Vec<Vector3<f64>>,
}

impl Frame {
    pub fn bone_count(&self) -> usize {
        self.translations.len()
    }

    /// True when every per-bone array matches `bone_count`
    pub fn is_aligned_with(&self, bone_count: usize) -> bool {
        self.translations.len() == bone_count
            && self.rotations.len() == bone_count
            && self.diagnostics.as_ref().map_or(true, |d| {
                d.head_world.len() == bone_count && d.tail_world.len() == bone_count
            })
    }

    /// Same pose, different timestamp
    pub fn retimed(&self, time: f64) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}

/// Where the rebase baseline comes from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Baseline is the externally supplied session origin
    PreserveOrigin { origin: Transform },
    /// Baseline is the target's own root transform on the first capture
    RebaseToStart,
}

impl Default for BaselinePolicy {
    fn default() -> Self {
        Self::PreserveOrigin {
            origin: Transform::identity(),
        }
    }
}

/// What a recorder samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Full bone hierarchy
    #[default]
    Skeletal,
    /// Owner world transform as a single `root` bone
    TransformOnly,
}

/// Detached copy of a finished recording
///
/// Carries no reference to the live target; bake jobs own these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSnapshot {
    /// Name of the recorded actor (diagnostics only)
    pub source_name: String,

    pub descriptor: Option<SkeletonDescriptor>,

    pub frames: Vec<Frame>,

    pub sample_rate_hz: f64,

    pub baseline_policy: BaselinePolicy,

    pub capture_mode: CaptureMode,

    /// Session sample index the recording was started at
    #[serde(default)]
    pub start_sample_index: u64,
}

impl RecordingSnapshot {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn bone_count(&self) -> usize {
        self.descriptor
            .as_ref()
            .map(SkeletonDescriptor::bone_count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bones: usize) -> Frame {
        Frame {
            time: 0.0,
            translations: vec![Vector3::zeros(); bones],
            rotations: vec![UnitQuaternion::identity(); bones],
            diagnostics: None,
        }
    }

    #[test]
    fn test_alignment() {
        let mut f = frame(3);
        assert!(f.is_aligned_with(3));
        assert!(!f.is_aligned_with(2));

        f.rotations.pop();
        assert!(!f.is_aligned_with(3));
    }

    #[test]
    fn test_diagnostics_participate_in_alignment() {
        let mut f = frame(2);
        f.diagnostics = Some(FrameDiagnostics {
            head_world: vec![Vector3::zeros(); 2],
            tail_world: vec![Vector3::zeros(); 1],
        });
        assert!(!f.is_aligned_with(2));
    }

    #[test]
    fn test_retimed_keeps_pose() {
        let mut f = frame(1);
        f.translations[0] = Vector3::new(1.0, 2.0, 3.0);
        let g = f.retimed(0.5);
        assert_eq!(g.time, 0.5);
        assert_eq!(g.translations, f.translations);
    }

    #[test]
    fn test_default_baseline_is_identity_origin() {
        match BaselinePolicy::default() {
            BaselinePolicy::PreserveOrigin { origin } => {
                assert_eq!(origin, Transform::identity())
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = RecordingSnapshot {
            source_name: "Walker_1".into(),
            descriptor: Some(SkeletonDescriptor::single_bone("root")),
            frames: vec![frame(1)],
            sample_rate_hz: 60.0,
            baseline_policy: BaselinePolicy::RebaseToStart,
            capture_mode: CaptureMode::TransformOnly,
            start_sample_index: 4,
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: RecordingSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.bone_count(), 1);
    }
}
