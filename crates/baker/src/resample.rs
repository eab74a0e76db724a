//! Resampler - recorded frames to evenly spaced keyframe tracks
//!
//! Nearest-sample resampling with rounding and no interpolation. The source
//! rate is rounded to whole frames per second before any timing math, and
//! scale keys are always unit.

use contracts::{BakedAnimation, BoneTrack, RecordingSnapshot, SkeletonDescriptor};
use nalgebra::Vector3;
use tracing::{debug, instrument};

use crate::error::{BakeError, Result};

pub const MIN_EXPORT_FPS: u32 = 1;
pub const MAX_EXPORT_FPS: u32 = 240;

/// Absorbs float noise in `duration / output_dt` so exact multiples keep their last frame
const FRAME_COUNT_EPSILON: f64 = 1e-9;

/// Round half up: `floor(x + 0.5)`
fn round_to_int(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Resampling plan for one export rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    export_fps: u32,
}

impl Resampler {
    /// Export rate is clamped to `[1, 240]`
    pub fn new(export_fps: u32) -> Self {
        Self {
            export_fps: export_fps.clamp(MIN_EXPORT_FPS, MAX_EXPORT_FPS),
        }
    }

    pub fn export_fps(&self) -> u32 {
        self.export_fps
    }

    /// Whole source frames per second, never below 1
    pub fn source_fps(sample_rate_hz: f64) -> u32 {
        if !sample_rate_hz.is_finite() {
            return 1;
        }
        round_to_int(sample_rate_hz).clamp(1, u32::MAX as i64) as u32
    }

    /// Source frame index for every output frame
    ///
    /// `frame_count` must be at least 1.
    pub fn source_indices(&self, frame_count: usize, sample_rate_hz: f64) -> Vec<usize> {
        if frame_count == 0 {
            return Vec::new();
        }
        let source_dt = 1.0 / Self::source_fps(sample_rate_hz) as f64;
        let output_dt = 1.0 / self.export_fps as f64;

        let duration = (frame_count - 1) as f64 * source_dt;
        let out_frames = ((duration / output_dt + FRAME_COUNT_EPSILON).floor() as usize + 1).max(1);
        let last = (frame_count - 1) as i64;

        (0..out_frames)
            .map(|k| {
                let t = k as f64 * output_dt;
                round_to_int(t / source_dt).clamp(0, last) as usize
            })
            .collect()
    }

    /// Check the snapshot and return its descriptor
    pub fn validate<'a>(
        snapshot: &'a RecordingSnapshot,
        job: &str,
    ) -> Result<&'a SkeletonDescriptor> {
        if snapshot.frames.is_empty() {
            return Err(BakeError::EmptyRecording {
                job: job.to_string(),
            });
        }
        let descriptor = snapshot
            .descriptor
            .as_ref()
            .ok_or_else(|| BakeError::MissingDescriptor {
                job: job.to_string(),
            })?;

        let expected = descriptor.bone_count();
        if let Some((frame, f)) = snapshot
            .frames
            .iter()
            .enumerate()
            .find(|(_, f)| !f.is_aligned_with(expected))
        {
            return Err(BakeError::MisalignedFrame {
                job: job.to_string(),
                frame,
                expected,
                actual: f.bone_count(),
            });
        }
        Ok(descriptor)
    }

    /// Bake a snapshot into an animation asset
    ///
    /// Deterministic: identical input yields bit-identical output.
    #[instrument(
        level = "debug",
        name = "resampler_bake",
        skip(self, snapshot, asset_path),
        fields(frames = snapshot.frames.len(), export_fps = self.export_fps)
    )]
    pub fn bake(
        &self,
        snapshot: &RecordingSnapshot,
        name: &str,
        asset_path: &str,
    ) -> Result<BakedAnimation> {
        let descriptor = Self::validate(snapshot, name)?;
        let indices = self.source_indices(snapshot.frames.len(), snapshot.sample_rate_hz);

        let tracks = descriptor
            .bone_names()
            .iter()
            .enumerate()
            .map(|(bone, bone_name)| BoneTrack {
                bone_name: bone_name.clone(),
                positions: indices
                    .iter()
                    .map(|&i| snapshot.frames[i].translations[bone])
                    .collect(),
                rotations: indices
                    .iter()
                    .map(|&i| snapshot.frames[i].rotations[bone])
                    .collect(),
                scales: vec![Vector3::repeat(1.0); indices.len()],
            })
            .collect();

        debug!(out_frames = indices.len(), "resampled");
        Ok(BakedAnimation {
            name: name.to_string(),
            asset_path: asset_path.to_string(),
            skeleton: descriptor.clone(),
            frame_rate: self.export_fps,
            frame_count: indices.len(),
            tracks,
        })
    }
}

/// One-shot helper over [`Resampler::bake`]
pub fn resample(
    snapshot: &RecordingSnapshot,
    export_fps: u32,
    name: &str,
    asset_path: &str,
) -> Result<BakedAnimation> {
    Resampler::new(export_fps).bake(snapshot, name, asset_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BaselinePolicy, CaptureMode, Frame};
    use nalgebra::UnitQuaternion;

    fn three_bone() -> SkeletonDescriptor {
        SkeletonDescriptor::new(
            vec!["root".into(), "spine".into(), "head".into()],
            vec![-1, 0, 1],
        )
        .unwrap()
    }

    fn snapshot(frames: usize, rate: f64) -> RecordingSnapshot {
        let frames = (0..frames)
            .map(|k| Frame {
                time: k as f64 / rate,
                translations: vec![Vector3::new(k as f64, 0.0, 0.0); 3],
                rotations: vec![UnitQuaternion::identity(); 3],
                diagnostics: None,
            })
            .collect();
        RecordingSnapshot {
            source_name: "Walker_1".into(),
            descriptor: Some(three_bone()),
            frames,
            sample_rate_hz: rate,
            baseline_policy: BaselinePolicy::default(),
            capture_mode: CaptureMode::Skeletal,
            start_sample_index: 0,
        }
    }

    #[test]
    fn test_three_frames_60hz_to_30fps() {
        let baked = resample(&snapshot(3, 60.0), 30, "Mocap_A", "/MocapCaptures").unwrap();
        assert_eq!(baked.frame_count, 2);
        assert_eq!(baked.frame_rate, 30);
        let root = baked.track("root").unwrap();
        assert_eq!(root.positions.len(), 2);
        // output frame 1 (t = 1/30) maps to source frame 2
        assert_eq!(root.positions[1].x, 2.0);
        assert!(root.scales.iter().all(|s| *s == Vector3::repeat(1.0)));
    }

    #[test]
    fn test_single_frame() {
        let r = Resampler::new(30);
        assert_eq!(r.source_indices(1, 60.0), vec![0]);
        let baked = r.bake(&snapshot(1, 60.0), "one", "/MocapCaptures").unwrap();
        assert_eq!(baked.frame_count, 1);
    }

    #[test]
    fn test_export_fps_clamped() {
        assert_eq!(Resampler::new(0).export_fps(), 1);
        assert_eq!(Resampler::new(1000).export_fps(), 240);
    }

    #[test]
    fn test_source_fps_rounding() {
        assert_eq!(Resampler::source_fps(59.94), 60);
        assert_eq!(Resampler::source_fps(0.2), 1);
        assert_eq!(Resampler::source_fps(-3.0), 1);
        assert_eq!(Resampler::source_fps(f64::NAN), 1);
    }

    #[test]
    fn test_downsampling_picks_every_other() {
        let idx = Resampler::new(30).source_indices(7, 60.0);
        assert_eq!(idx, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_upsampling_is_monotonic() {
        let idx = Resampler::new(60).source_indices(4, 30.0);
        assert_eq!(idx.len(), 7);
        assert!(idx.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(idx[6], 3);
    }

    #[test]
    fn test_indices_stay_in_range() {
        let r = Resampler::new(24);
        for n in 1..200 {
            let idx = r.source_indices(n, 60.0);
            assert!(idx.iter().all(|&i| i < n));
            assert_eq!(idx[0], 0);
        }
    }

    #[test]
    fn test_deterministic() {
        let snap = snapshot(17, 60.0);
        let a = resample(&snap, 24, "x", "/MocapCaptures").unwrap();
        let b = resample(&snap, 24, "x", "/MocapCaptures").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_jobs() {
        let mut empty = snapshot(0, 60.0);
        assert!(matches!(
            resample(&empty, 30, "e", "/M"),
            Err(BakeError::EmptyRecording { .. })
        ));

        empty = snapshot(2, 60.0);
        empty.descriptor = None;
        assert!(matches!(
            resample(&empty, 30, "d", "/M"),
            Err(BakeError::MissingDescriptor { .. })
        ));

        let mut bad = snapshot(3, 60.0);
        bad.frames[1].translations.pop();
        let err = resample(&bad, 30, "m", "/M").unwrap_err();
        assert!(matches!(err, BakeError::MisalignedFrame { frame: 1, .. }));
        assert!(err.is_invalid_job());
    }
}
