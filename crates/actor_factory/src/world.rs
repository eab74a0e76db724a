//! In-memory scene host
//!
//! `MockWorld` implements both host capability traits so the capture pipeline
//! can run without an engine: actors have a class chain, an optional bone
//! table, a world transform and a constant velocity. Failure injection hooks
//! let tests exercise the fail-closed paths of the sampler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use contracts::{
    ActorId, ActorInfo, BoneSpec, ContractError, SceneEvent, SceneEventSender, SceneProvider,
    SkeletonDescriptor, SkeletonProvider, Transform,
};
use nalgebra::{Translation3, UnitQuaternion, Vector3};
use tracing::{debug, instrument};

use crate::error::{ActorFactoryError, Result};

/// Reference-pose bone table for a mock skeletal actor
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBlueprint {
    descriptor: SkeletonDescriptor,
    /// Per-bone offset from the parent, in the parent's space
    offsets: Vec<Vector3<f64>>,
}

impl SkeletonBlueprint {
    /// Linear chain: bone `i` is parented to bone `i - 1`
    ///
    /// Fails on an empty list or duplicate names.
    pub fn chain(bones: &[(&str, Vector3<f64>)]) -> Result<Self> {
        let names = bones.iter().map(|(n, _)| n.to_string()).collect();
        let parents = (0..bones.len() as i32).map(|i| i - 1).collect();
        let descriptor = SkeletonDescriptor::new(names, parents)?;
        Ok(Self {
            descriptor,
            offsets: bones.iter().map(|(_, o)| *o).collect(),
        })
    }

    /// Build from configured bones
    pub fn from_specs(bones: &[BoneSpec]) -> Result<Self> {
        let descriptor = SkeletonDescriptor::new(
            bones.iter().map(|b| b.name.clone()).collect(),
            bones.iter().map(|b| b.parent).collect(),
        )?;
        Ok(Self {
            descriptor,
            offsets: bones.iter().map(|b| b.offset.to_vector()).collect(),
        })
    }

    pub fn descriptor(&self) -> &SkeletonDescriptor {
        &self.descriptor
    }

    pub fn bone_count(&self) -> usize {
        self.descriptor.bone_count()
    }

    /// Component-space reference pose, parents resolved before children
    pub fn component_space(&self) -> Vec<Transform> {
        let n = self.bone_count();
        let mut resolved: Vec<Option<Transform>> = vec![None; n];
        for bone in 0..n {
            Self::resolve(bone, &self.descriptor, &self.offsets, &mut resolved);
        }
        resolved
            .into_iter()
            .map(|t| t.unwrap_or_else(Transform::identity))
            .collect()
    }

    // Descriptor guarantees acyclic parents, so the recursion terminates.
    fn resolve(
        bone: usize,
        descriptor: &SkeletonDescriptor,
        offsets: &[Vector3<f64>],
        resolved: &mut [Option<Transform>],
    ) -> Transform {
        if let Some(t) = resolved[bone] {
            return t;
        }
        let local = Transform::from_parts(
            Translation3::from(offsets[bone]),
            UnitQuaternion::identity(),
        );
        let cs = match descriptor.parent(bone) {
            Some(parent) => Self::resolve(parent, descriptor, offsets, resolved) * local,
            None => local,
        };
        resolved[bone] = Some(cs);
        cs
    }
}

/// Failure injection for mock worlds
#[derive(Debug, Default, Clone)]
pub struct MockConfig {
    /// Actor names whose spawn should fail
    pub fail_spawns: Vec<String>,
}

/// Everything needed to spawn one actor
#[derive(Debug, Clone)]
pub struct ActorSpec {
    pub name: String,
    pub class_chain: Vec<String>,
    pub tags: Vec<String>,
    pub skeleton: Option<SkeletonBlueprint>,
    pub transform: Transform,
    /// Units per second
    pub velocity: Vector3<f64>,
    /// Scaled axis, radians per second
    pub angular_velocity: Vector3<f64>,
}

impl ActorSpec {
    pub fn new(name: impl Into<String>, class_chain: &[&str]) -> Self {
        Self {
            name: name.into(),
            class_chain: class_chain.iter().map(|c| c.to_string()).collect(),
            tags: Vec::new(),
            skeleton: None,
            transform: Transform::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }

    pub fn with_skeleton(mut self, skeleton: SkeletonBlueprint) -> Self {
        self.skeleton = Some(skeleton);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }
}

#[derive(Debug, Clone)]
struct MockActor {
    info: ActorInfo,
    skeleton: Option<SkeletonBlueprint>,
    transform: Transform,
    velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    /// Drop the last component-space transform on read
    truncate_transforms: bool,
    /// Report this bone count instead of the real one
    bone_count_override: Option<usize>,
}

/// Scene host backed by plain maps
pub struct MockWorld {
    config: MockConfig,
    next_actor_id: AtomicU32,
    actors: BTreeMap<ActorId, MockActor>,
    primary_subject: Option<Vector3<f64>>,
    external_context_active: bool,
    events: Option<SceneEventSender>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            // ids start at 1000 to stand out in logs
            next_actor_id: AtomicU32::new(1000),
            actors: BTreeMap::new(),
            primary_subject: None,
            external_context_active: false,
            events: None,
        }
    }

    /// Route spawn / destroy / hit notifications to a session
    pub fn attach_events(&mut self, sender: SceneEventSender) {
        self.events = Some(sender);
    }

    fn emit(&self, event: SceneEvent) {
        if let Some(sender) = &self.events {
            if sender.send(event).is_err() {
                debug!(?event, "event receiver dropped");
            }
        }
    }

    fn allocate_actor_id(&self) -> ActorId {
        ActorId(self.next_actor_id.fetch_add(1, Ordering::SeqCst))
    }

    // ===== Actor lifecycle =====

    /// Spawn from a full spec, honouring injected failures
    #[instrument(name = "mock_world_spawn", skip(self, spec), fields(name = %spec.name))]
    pub fn try_spawn(&mut self, spec: ActorSpec) -> Result<ActorId> {
        if self.config.fail_spawns.contains(&spec.name) {
            return Err(ActorFactoryError::spawn(&spec.name, "mock failure"));
        }

        Ok(self.spawn_unchecked(spec))
    }

    /// Fixture helper: spawn a skeletal actor
    pub fn spawn_skeletal(
        &mut self,
        name: &str,
        class_chain: &[&str],
        skeleton: SkeletonBlueprint,
        transform: Transform,
    ) -> ActorId {
        self.spawn_unchecked(
            ActorSpec::new(name, class_chain)
                .with_skeleton(skeleton)
                .with_transform(transform),
        )
    }

    /// Fixture helper: spawn an actor without a skeleton
    pub fn spawn_prop(&mut self, name: &str, class_chain: &[&str], transform: Transform) -> ActorId {
        self.spawn_unchecked(ActorSpec::new(name, class_chain).with_transform(transform))
    }

    fn spawn_unchecked(&mut self, spec: ActorSpec) -> ActorId {
        let id = self.allocate_actor_id();
        self.actors.insert(
            id,
            MockActor {
                info: ActorInfo {
                    name: spec.name,
                    class_chain: spec.class_chain,
                    tags: spec.tags,
                },
                skeleton: spec.skeleton,
                transform: spec.transform,
                velocity: spec.velocity,
                angular_velocity: spec.angular_velocity,
                truncate_transforms: false,
                bone_count_override: None,
            },
        );
        self.emit(SceneEvent::Spawned(id));
        id
    }

    /// Remove an actor; unknown ids are ignored
    pub fn destroy(&mut self, actor: ActorId) -> bool {
        if self.actors.remove(&actor).is_some() {
            self.emit(SceneEvent::Destroyed(actor));
            true
        } else {
            false
        }
    }

    /// Report a collision involving `actor`
    pub fn hit(&mut self, actor: ActorId, other: Option<ActorId>) {
        if self.actors.contains_key(&actor) {
            self.emit(SceneEvent::Hit { actor, other });
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<ActorId> {
        self.actors
            .iter()
            .find(|(_, a)| a.info.name == name)
            .map(|(id, _)| *id)
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    // ===== Motion =====

    pub fn set_actor_transform(&mut self, actor: ActorId, transform: Transform) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.transform = transform;
        }
    }

    pub fn set_velocity(&mut self, actor: ActorId, velocity: Vector3<f64>) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.velocity = velocity;
        }
    }

    pub fn set_angular_velocity(&mut self, actor: ActorId, angular_velocity: Vector3<f64>) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.angular_velocity = angular_velocity;
        }
    }

    /// Freeze an actor in place
    pub fn stop_moving(&mut self, actor: ActorId) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.velocity = Vector3::zeros();
            a.angular_velocity = Vector3::zeros();
        }
    }

    /// Integrate every actor's velocity over `dt` seconds
    pub fn step(&mut self, dt: f64) {
        for actor in self.actors.values_mut() {
            actor.transform.translation.vector += actor.velocity * dt;
            if actor.angular_velocity != Vector3::zeros() {
                let spin = UnitQuaternion::from_scaled_axis(actor.angular_velocity * dt);
                actor.transform.rotation = spin * actor.transform.rotation;
                actor.transform.rotation.renormalize();
            }
        }
    }

    pub fn set_primary_subject(&mut self, location: Option<Vector3<f64>>) {
        self.primary_subject = location;
    }

    pub fn set_external_context_active(&mut self, active: bool) {
        self.external_context_active = active;
    }

    // ===== Failure injection =====

    /// Return one transform fewer than the bone count
    pub fn inject_transform_truncation(&mut self, actor: ActorId, enabled: bool) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.truncate_transforms = enabled;
        }
    }

    /// Report `count` bones instead of the real number (None restores it)
    pub fn inject_bone_count(&mut self, actor: ActorId, count: Option<usize>) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.bone_count_override = count;
        }
    }

    fn actor(&self, actor: ActorId) -> std::result::Result<&MockActor, ContractError> {
        self.actors
            .get(&actor)
            .ok_or(ContractError::ActorNotFound { actor_id: actor })
    }

    fn skeleton(
        &self,
        actor: ActorId,
    ) -> std::result::Result<(&MockActor, &SkeletonBlueprint), ContractError> {
        let a = self.actor(actor)?;
        a.skeleton
            .as_ref()
            .map(|s| (a, s))
            .ok_or(ContractError::SkeletonUnavailable { actor_id: actor })
    }
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonProvider for MockWorld {
    fn has_skeleton(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|a| a.skeleton.is_some())
    }

    fn bone_count(&self, actor: ActorId) -> std::result::Result<usize, ContractError> {
        let (a, s) = self.skeleton(actor)?;
        Ok(a.bone_count_override.unwrap_or_else(|| s.bone_count()))
    }

    fn bone_name(&self, actor: ActorId, bone: usize) -> std::result::Result<String, ContractError> {
        let (_, s) = self.skeleton(actor)?;
        s.descriptor()
            .bone_name(bone)
            .map(str::to_string)
            .ok_or(ContractError::BoneOutOfRange {
                actor_id: actor,
                bone,
                bone_count: s.bone_count(),
            })
    }

    fn parent_index(&self, actor: ActorId, bone: usize) -> std::result::Result<i32, ContractError> {
        let (_, s) = self.skeleton(actor)?;
        s.descriptor()
            .parent_indices()
            .get(bone)
            .copied()
            .ok_or(ContractError::BoneOutOfRange {
                actor_id: actor,
                bone,
                bone_count: s.bone_count(),
            })
    }

    fn refresh_pose(&self, actor: ActorId) -> std::result::Result<(), ContractError> {
        self.skeleton(actor).map(|_| ())
    }

    fn component_space_transforms(
        &self,
        actor: ActorId,
    ) -> std::result::Result<Vec<Transform>, ContractError> {
        let (a, s) = self.skeleton(actor)?;
        let mut pose = s.component_space();
        if a.truncate_transforms {
            pose.pop();
        }
        Ok(pose)
    }

    fn component_to_world(&self, actor: ActorId) -> std::result::Result<Transform, ContractError> {
        Ok(self.skeleton(actor)?.0.transform)
    }
}

impl SceneProvider for MockWorld {
    fn actor_exists(&self, actor: ActorId) -> bool {
        self.actors.contains_key(&actor)
    }

    fn actor_info(&self, actor: ActorId) -> Option<ActorInfo> {
        self.actors.get(&actor).map(|a| a.info.clone())
    }

    fn actor_transform(&self, actor: ActorId) -> std::result::Result<Transform, ContractError> {
        Ok(self.actor(actor)?.transform)
    }

    fn live_actors(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    fn primary_subject_location(&self) -> Option<Vector3<f64>> {
        self.primary_subject
    }

    fn is_external_context_active(&self) -> bool {
        self.external_context_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::scene_event_channel;

    fn chain() -> SkeletonBlueprint {
        SkeletonBlueprint::chain(&[
            ("root", Vector3::zeros()),
            ("spine", Vector3::new(0.0, 0.0, 10.0)),
            ("head", Vector3::new(0.0, 0.0, 5.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_invalid_chain_is_an_error() {
        assert!(SkeletonBlueprint::chain(&[]).is_err());
        let dup = SkeletonBlueprint::chain(&[
            ("root", Vector3::zeros()),
            ("root", Vector3::new(0.0, 0.0, 1.0)),
        ]);
        assert!(matches!(dup, Err(ActorFactoryError::Contract(_))));
    }

    #[test]
    fn test_component_space_accumulates_offsets() {
        let pose = chain().component_space();
        assert_eq!(pose.len(), 3);
        assert_eq!(pose[0], Transform::identity());
        assert!((pose[2].translation.vector - Vector3::new(0.0, 0.0, 15.0)).norm() < 1e-12);
    }

    #[test]
    fn test_component_space_with_out_of_order_parents() {
        let bones = vec![
            BoneSpec {
                name: "hand".into(),
                parent: 1,
                offset: contracts::Location {
                    x: 1.0,
                    y: 0.0,
                    z: 0.0,
                },
            },
            BoneSpec {
                name: "root".into(),
                parent: -1,
                offset: contracts::Location {
                    x: 0.0,
                    y: 0.0,
                    z: 2.0,
                },
            },
        ];
        let skel = SkeletonBlueprint::from_specs(&bones).unwrap();
        let pose = skel.component_space();
        assert!((pose[0].translation.vector - Vector3::new(1.0, 0.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_ids_start_at_1000() {
        let mut world = MockWorld::new();
        let a = world.spawn_prop("A", &["Prop"], Transform::identity());
        let b = world.spawn_prop("B", &["Prop"], Transform::identity());
        assert_eq!(a, ActorId(1000));
        assert_eq!(b, ActorId(1001));
        assert_eq!(world.live_actors(), vec![a, b]);
    }

    #[test]
    fn test_lifecycle_events() {
        let (tx, mut rx) = scene_event_channel();
        let mut world = MockWorld::new();
        world.attach_events(tx);

        let a = world.spawn_skeletal("W", &["Walker"], chain(), Transform::identity());
        world.hit(a, None);
        assert!(world.destroy(a));
        assert!(!world.destroy(a));

        assert_eq!(rx.try_recv().unwrap(), SceneEvent::Spawned(a));
        assert_eq!(rx.try_recv().unwrap(), SceneEvent::Hit { actor: a, other: None });
        assert_eq!(rx.try_recv().unwrap(), SceneEvent::Destroyed(a));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_step_integrates_velocity() {
        let mut world = MockWorld::new();
        let a = world
            .try_spawn(ActorSpec::new("Runner", &["Walker"]).with_velocity(Vector3::new(60.0, 0.0, 0.0)))
            .unwrap();
        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }
        let t = world.actor_transform(a).unwrap();
        assert!((t.translation.vector.x - 60.0).abs() < 1e-9);

        world.stop_moving(a);
        world.step(1.0);
        assert!((world.actor_transform(a).unwrap().translation.vector.x - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_injected_spawn_failure() {
        let mut world = MockWorld::with_config(MockConfig {
            fail_spawns: vec!["Broken".into()],
        });
        assert!(world.try_spawn(ActorSpec::new("Broken", &["Prop"])).is_err());
        assert_eq!(world.actor_count(), 0);
    }

    #[test]
    fn test_prop_has_no_skeleton() {
        let mut world = MockWorld::new();
        let p = world.spawn_prop("Crate", &["Prop"], Transform::identity());
        assert!(!world.has_skeleton(p));
        assert!(matches!(
            world.bone_count(p),
            Err(ContractError::SkeletonUnavailable { .. })
        ));
        assert!(matches!(
            world.bone_count(ActorId(1)),
            Err(ContractError::ActorNotFound { .. })
        ));
    }
}
