//! PoseSampler - world pose to rebased local frame
//!
//! Per capture:
//! 1. force a pose evaluation, read component-space bones
//! 2. world = component_to_world * component_space
//! 3. establish the baseline once (first capture of a recording)
//! 4. relative = inverse(baseline) * world
//! 5. root keeps `relative`, other bones are expressed in their parent's space
//!
//! Any size disagreement with the descriptor fails the capture; no partial
//! frame is ever returned.

use contracts::{
    rebase, relative_to, ActorId, BaselinePolicy, Frame, FrameDiagnostics, SceneProvider,
    SkeletonDescriptor, SkeletonProvider, Transform,
};
use tracing::instrument;

use crate::error::{CaptureError, Result};

/// Lazily established rebase transform
///
/// Set on the first capture of a recording and frozen until `reset`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Baseline(Option<Transform>);

impl Baseline {
    pub fn get(&self) -> Option<Transform> {
        self.0
    }

    pub fn is_established(&self) -> bool {
        self.0.is_some()
    }

    pub fn reset(&mut self) {
        self.0 = None;
    }

    /// Return the frozen baseline, establishing it from `policy` if needed
    pub fn resolve(&mut self, policy: &BaselinePolicy, root_world: &Transform) -> Transform {
        *self.0.get_or_insert_with(|| match policy {
            BaselinePolicy::PreserveOrigin { origin } => *origin,
            BaselinePolicy::RebaseToStart => *root_world,
        })
    }
}

/// Stateless pose extraction
pub struct PoseSampler;

impl PoseSampler {
    /// Capture one skeletal frame (time is left at 0; the recorder stamps it)
    #[instrument(
        level = "trace",
        name = "pose_sampler_capture",
        skip(provider, descriptor, policy, baseline),
        fields(actor = %actor, bones = descriptor.bone_count())
    )]
    pub fn capture<P>(
        provider: &P,
        actor: ActorId,
        descriptor: &SkeletonDescriptor,
        policy: &BaselinePolicy,
        baseline: &mut Baseline,
    ) -> Result<Frame>
    where
        P: SkeletonProvider + ?Sized,
    {
        if !provider.has_skeleton(actor) {
            return Err(CaptureError::NoSkeleton { actor_id: actor });
        }

        provider.refresh_pose(actor)?;

        let expected = descriptor.bone_count();
        let live = provider.bone_count(actor)?;
        if live != expected {
            return Err(CaptureError::BoneCountMismatch {
                actor_id: actor,
                expected,
                actual: live,
            });
        }

        let component_space = provider.component_space_transforms(actor)?;
        if component_space.len() != expected {
            return Err(CaptureError::TransformCountMismatch {
                actor_id: actor,
                expected,
                actual: component_space.len(),
            });
        }

        let component_to_world = provider.component_to_world(actor)?;
        let world: Vec<Transform> = component_space
            .iter()
            .map(|cs| component_to_world * cs)
            .collect();

        let root = descriptor.root_index().unwrap_or(0);
        let base = baseline.resolve(policy, &world[root]);
        let relative: Vec<Transform> = world.iter().map(|w| rebase(&base, w)).collect();

        Ok(Self::frame_from_relative(descriptor, &relative))
    }

    /// Capture the actor's world transform as a one-bone frame
    #[instrument(
        level = "trace",
        name = "pose_sampler_capture_transform",
        skip(scene, policy, baseline),
        fields(actor = %actor)
    )]
    pub fn capture_transform<S>(
        scene: &S,
        actor: ActorId,
        policy: &BaselinePolicy,
        baseline: &mut Baseline,
    ) -> Result<Frame>
    where
        S: SceneProvider + ?Sized,
    {
        let world = scene.actor_transform(actor)?;
        let base = baseline.resolve(policy, &world);
        let relative = rebase(&base, &world);
        let head = relative.translation.vector;

        Ok(Frame {
            time: 0.0,
            translations: vec![head],
            rotations: vec![relative.rotation],
            diagnostics: Some(FrameDiagnostics {
                head_world: vec![head],
                tail_world: vec![head],
            }),
        })
    }

    fn frame_from_relative(descriptor: &SkeletonDescriptor, relative: &[Transform]) -> Frame {
        let n = descriptor.bone_count();
        let mut translations = Vec::with_capacity(n);
        let mut rotations = Vec::with_capacity(n);
        let mut head_world = Vec::with_capacity(n);
        let mut tail_world = Vec::with_capacity(n);

        for (bone, rel) in relative.iter().enumerate() {
            let local = match descriptor.parent(bone) {
                Some(parent) => relative_to(rel, &relative[parent]),
                None => *rel,
            };
            translations.push(local.translation.vector);
            rotations.push(local.rotation);

            let head = rel.translation.vector;
            let tail = descriptor
                .first_child(bone)
                .map(|child| relative[child].translation.vector)
                .unwrap_or(head);
            head_world.push(head);
            tail_world.push(tail);
        }

        Frame {
            time: 0.0,
            translations,
            rotations,
            diagnostics: Some(FrameDiagnostics {
                head_world,
                tail_world,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockWorld, SkeletonBlueprint};
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn chain() -> SkeletonBlueprint {
        SkeletonBlueprint::chain(&[
            ("root", Vector3::zeros()),
            ("spine", Vector3::new(0.0, 0.0, 10.0)),
            ("head", Vector3::new(0.0, 0.0, 5.0)),
        ])
        .unwrap()
    }

    fn descriptor() -> SkeletonDescriptor {
        SkeletonDescriptor::new(
            vec!["root".into(), "spine".into(), "head".into()],
            vec![-1, 0, 1],
        )
        .unwrap()
    }

    fn close(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn test_preserve_origin_keeps_world_placement() {
        let mut world = MockWorld::new();
        let actor = world.spawn_skeletal(
            "Walker_1",
            &["Walker"],
            chain(),
            Transform::translation(100.0, 0.0, 0.0),
        );

        let mut baseline = Baseline::default();
        let frame = PoseSampler::capture(
            &world,
            actor,
            &descriptor(),
            &BaselinePolicy::default(),
            &mut baseline,
        )
        .unwrap();

        assert!(frame.is_aligned_with(3));
        assert!(close(&frame.translations[0], &Vector3::new(100.0, 0.0, 0.0)));
        assert!(close(&frame.translations[1], &Vector3::new(0.0, 0.0, 10.0)));
        assert!(close(&frame.translations[2], &Vector3::new(0.0, 0.0, 5.0)));

        let diag = frame.diagnostics.unwrap();
        assert!(close(&diag.head_world[1], &Vector3::new(100.0, 0.0, 10.0)));
        assert!(close(&diag.tail_world[1], &Vector3::new(100.0, 0.0, 15.0)));
        // leaf: tail falls back to head
        assert!(close(&diag.tail_world[2], &diag.head_world[2]));
    }

    #[test]
    fn test_rebase_to_start_zeroes_first_root() {
        let mut world = MockWorld::new();
        let start = Transform::new(Vector3::new(10.0, -4.0, 2.0), Vector3::z() * FRAC_PI_2);
        let actor = world.spawn_skeletal("Walker_1", &["Walker"], chain(), start);

        let mut baseline = Baseline::default();
        let frame = PoseSampler::capture(
            &world,
            actor,
            &descriptor(),
            &BaselinePolicy::RebaseToStart,
            &mut baseline,
        )
        .unwrap();

        assert!(frame.translations[0].norm() < 1e-9);
        assert!(frame.rotations[0].angle() < 1e-9);
        let base = baseline.get().unwrap();
        assert!(close(&base.translation.vector, &start.translation.vector));
        assert!(base.rotation.angle_to(&start.rotation) < 1e-12);
    }

    #[test]
    fn test_baseline_frozen_after_first_capture() {
        let mut world = MockWorld::new();
        let actor = world.spawn_skeletal(
            "Walker_1",
            &["Walker"],
            chain(),
            Transform::translation(1.0, 2.0, 3.0),
        );
        let mut baseline = Baseline::default();
        let desc = descriptor();
        let policy = BaselinePolicy::RebaseToStart;

        PoseSampler::capture(&world, actor, &desc, &policy, &mut baseline).unwrap();
        let first = baseline.get();

        world.set_actor_transform(actor, Transform::translation(50.0, 0.0, 0.0));
        let frame = PoseSampler::capture(&world, actor, &desc, &policy, &mut baseline).unwrap();

        assert_eq!(baseline.get(), first);
        assert!(close(&frame.translations[0], &Vector3::new(49.0, -2.0, -3.0)));
    }

    #[test]
    fn test_local_rotation_relative_to_parent() {
        let mut world = MockWorld::new();
        let actor = world.spawn_skeletal(
            "Walker_1",
            &["Walker"],
            chain(),
            Transform::new(Vector3::zeros(), Vector3::z() * FRAC_PI_2),
        );

        let frame = PoseSampler::capture(
            &world,
            actor,
            &descriptor(),
            &BaselinePolicy::default(),
            &mut Baseline::default(),
        )
        .unwrap();

        // the actor yaw lives on the root only
        let expected = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        assert!(frame.rotations[0].angle_to(&expected) < 1e-9);
        assert!(frame.rotations[1].angle() < 1e-9);
        assert!(frame.rotations[2].angle() < 1e-9);
    }

    #[test]
    fn test_bone_count_mismatch_fails_closed() {
        let mut world = MockWorld::new();
        let actor = world.spawn_skeletal(
            "Walker_1",
            &["Walker"],
            chain(),
            Transform::identity(),
        );
        let two_bones =
            SkeletonDescriptor::new(vec!["root".into(), "spine".into()], vec![-1, 0]).unwrap();

        let mut baseline = Baseline::default();
        let err = PoseSampler::capture(
            &world,
            actor,
            &two_bones,
            &BaselinePolicy::RebaseToStart,
            &mut baseline,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CaptureError::BoneCountMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert!(!baseline.is_established());
    }

    #[test]
    fn test_transform_count_mismatch_fails_closed() {
        let mut world = MockWorld::new();
        let actor = world.spawn_skeletal("W", &["Walker"], chain(), Transform::identity());
        world.inject_transform_truncation(actor, true);

        let err = PoseSampler::capture(
            &world,
            actor,
            &descriptor(),
            &BaselinePolicy::default(),
            &mut Baseline::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CaptureError::TransformCountMismatch { .. }));
    }

    #[test]
    fn test_no_skeleton() {
        let mut world = MockWorld::new();
        let prop = world.spawn_prop("Crate", &["Prop"], Transform::identity());
        let err = PoseSampler::capture(
            &world,
            prop,
            &descriptor(),
            &BaselinePolicy::default(),
            &mut Baseline::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CaptureError::NoSkeleton { .. }));
    }

    #[test]
    fn test_transform_only_capture() {
        let mut world = MockWorld::new();
        let prop = world.spawn_prop("Crate", &["Prop"], Transform::translation(5.0, 5.0, 0.0));

        let mut baseline = Baseline::default();
        let policy = BaselinePolicy::RebaseToStart;
        let first = PoseSampler::capture_transform(&world, prop, &policy, &mut baseline).unwrap();
        assert!(first.translations[0].norm() < 1e-9);

        world.set_actor_transform(prop, Transform::translation(6.0, 5.0, 0.0));
        let second = PoseSampler::capture_transform(&world, prop, &policy, &mut baseline).unwrap();
        assert!(close(&second.translations[0], &Vector3::new(1.0, 0.0, 0.0)));
        assert!(second.is_aligned_with(1));
    }
}
