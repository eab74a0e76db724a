//! Baked animation assets - BakeQueue output

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::SkeletonDescriptor;

/// Evenly spaced keyframe tracks for every bone of a skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedAnimation {
    /// Asset name (without path)
    pub name: String,

    /// Namespace the asset is written under, e.g. `/MocapCaptures`
    pub asset_path: String,

    pub skeleton: SkeletonDescriptor,

    /// Output frames per second
    pub frame_rate: u32,

    pub frame_count: usize,

    /// One track per bone, in descriptor order
    pub tracks: Vec<BoneTrack>,
}

/// Keys for one bone; all three arrays have `frame_count` entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone_name: String,
    pub positions: Vec<Vector3<f64>>,
    pub rotations: Vec<UnitQuaternion<f64>>,
    pub scales: Vec<Vector3<f64>>,
}

impl BakedAnimation {
    /// Length in seconds of the baked clip
    pub fn duration(&self) -> f64 {
        if self.frame_count <= 1 || self.frame_rate == 0 {
            0.0
        } else {
            (self.frame_count - 1) as f64 / self.frame_rate as f64
        }
    }

    pub fn track(&self, bone_name: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone_name == bone_name)
    }

    /// `asset_path/name`
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.asset_path.trim_end_matches('/'), self.name)
    }
}

/// Reference to a persisted asset, returned by a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHandle {
    pub sink: String,
    /// Sink-specific location (file path, object path, ...)
    pub location: String,
}

/// Progress of the bake queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BakeStatus {
    pub jobs_done: usize,
    pub total_jobs: usize,
    /// Name of the job the next tick will process (empty when idle)
    pub current_job_name: String,
    pub is_baking: bool,
    pub awaiting_external_context_end: bool,
}
