//! Scenario driver
//!
//! Spawns the scripted actors of a `ScenarioConfig` into a `MockWorld` and
//! replays their spawn / stop / hit / destroy ticks.

use std::collections::HashMap;

use contracts::{ActorId, ScenarioActor, ScenarioConfig};
use nalgebra::Vector3;
use tracing::{error, info, instrument, warn};

use crate::error::{ActorFactoryError, Result};
use crate::world::{ActorSpec, MockWorld, SkeletonBlueprint};

/// What happened on one scripted tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub spawned: Vec<ActorId>,
    pub stopped: Vec<ActorId>,
    pub hit: Vec<ActorId>,
    pub destroyed: Vec<ActorId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty()
            && self.stopped.is_empty()
            && self.hit.is_empty()
            && self.destroyed.is_empty()
    }
}

/// Actor Factory
///
/// Owns the scenario script and the name -> id mapping of live scripted actors.
pub struct ActorFactory {
    scenario: ScenarioConfig,
    live: HashMap<String, ActorId>,
}

impl ActorFactory {
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self {
            scenario,
            live: HashMap::new(),
        }
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn actor_id(&self, name: &str) -> Option<ActorId> {
        self.live.get(name).copied()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Spawn every actor present at tick 0 and place the primary subject
    ///
    /// # Atomicity
    /// If any spawn fails, every actor created by this call is destroyed again.
    #[instrument(
        name = "actor_factory_spawn_initial",
        skip(self, world),
        fields(actor_count = self.scenario.actors.len())
    )]
    pub fn spawn_initial(&mut self, world: &mut MockWorld) -> Result<Vec<ActorId>> {
        world.set_primary_subject(self.scenario.primary_subject.map(|l| l.to_vector()));

        let mut created: Vec<(String, ActorId)> = Vec::new();
        for actor in self.scenario.actors.iter().filter(|a| a.spawn_tick == 0) {
            match Self::spawn_actor(world, actor) {
                Ok(id) => created.push((actor.name.clone(), id)),
                Err(e) => {
                    warn!(
                        error = %e,
                        actor = %actor.name,
                        "spawn failed, rolling back initial actors"
                    );
                    for (name, id) in &created {
                        Self::destroy_actor_safe(world, *id, name);
                    }
                    return Err(e);
                }
            }
        }

        info!(actors = created.len(), "initial actors spawned");
        let ids = created.iter().map(|(_, id)| *id).collect();
        self.live.extend(created);
        Ok(ids)
    }

    /// Replay the script for `tick` (ticks start at 1)
    ///
    /// Order within a tick: spawn, stop moving, hit, destroy. Late spawn
    /// failures are logged and skipped.
    #[instrument(level = "trace", name = "actor_factory_apply_tick", skip(self, world))]
    pub fn apply_tick(&mut self, world: &mut MockWorld, tick: u64) -> TickReport {
        let mut report = TickReport::default();
        if tick == 0 {
            return report;
        }

        for actor in self.scenario.actors.iter().filter(|a| a.spawn_tick == tick) {
            match Self::spawn_actor(world, actor) {
                Ok(id) => {
                    self.live.insert(actor.name.clone(), id);
                    report.spawned.push(id);
                }
                Err(e) => error!(actor = %actor.name, error = %e, "scripted spawn failed"),
            }
        }

        for actor in &self.scenario.actors {
            let Some(&id) = self.live.get(&actor.name) else {
                continue;
            };
            if actor.stop_moving_tick == Some(tick) {
                world.stop_moving(id);
                report.stopped.push(id);
            }
            if actor.hit_tick == Some(tick) {
                world.hit(id, None);
                report.hit.push(id);
            }
        }

        let doomed: Vec<String> = self
            .scenario
            .actors
            .iter()
            .filter(|a| a.destroy_tick == Some(tick))
            .map(|a| a.name.clone())
            .collect();
        for name in doomed {
            if let Some(id) = self.live.remove(&name) {
                Self::destroy_actor_safe(world, id, &name);
                report.destroyed.push(id);
            }
        }

        report
    }

    /// Destroy every scripted actor still alive; safe to call repeatedly
    #[instrument(name = "actor_factory_teardown", skip(self, world), fields(live = self.live.len()))]
    pub fn teardown(&mut self, world: &mut MockWorld) {
        for (name, id) in self.live.drain() {
            Self::destroy_actor_safe(world, id, &name);
        }
    }

    /// Look up a live scripted actor by name
    pub fn require(&self, name: &str) -> Result<ActorId> {
        self.actor_id(name)
            .ok_or_else(|| ActorFactoryError::ActorNotLive {
                actor_name: name.to_string(),
            })
    }

    fn spawn_actor(world: &mut MockWorld, actor: &ScenarioActor) -> Result<ActorId> {
        let skeleton = if actor.bones.is_empty() {
            None
        } else {
            Some(
                SkeletonBlueprint::from_specs(&actor.bones)
                    .map_err(|e| ActorFactoryError::spawn(&actor.name, e.to_string()))?,
            )
        };

        let spin = &actor.angular_velocity;
        let spec = ActorSpec {
            name: actor.name.clone(),
            class_chain: actor.class_chain.clone(),
            tags: actor.tags.clone(),
            skeleton,
            transform: actor.start.to_transform(),
            velocity: actor.velocity.to_vector(),
            angular_velocity: Vector3::new(
                spin.roll.to_radians(),
                spin.pitch.to_radians(),
                spin.yaw.to_radians(),
            ),
        };
        let id = world.try_spawn(spec)?;
        info!(actor = %actor.name, actor_id = %id, "scenario actor spawned");
        Ok(id)
    }

    fn destroy_actor_safe(world: &mut MockWorld, actor_id: ActorId, name: &str) {
        if !world.destroy(actor_id) {
            warn!(actor_id = %actor_id, actor = %name, "actor already gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MockConfig;
    use contracts::{BoneSpec, Location, SceneProvider, SkeletonProvider};

    fn scripted(name: &str, spawn_tick: u64) -> ScenarioActor {
        ScenarioActor {
            name: name.to_string(),
            class_chain: vec!["Walker".into(), "Character".into()],
            tags: vec![],
            bones: vec![BoneSpec {
                name: "root".into(),
                parent: -1,
                offset: Location::default(),
            }],
            spawn_tick,
            destroy_tick: None,
            hit_tick: None,
            stop_moving_tick: None,
            start: Default::default(),
            velocity: Location {
                x: 120.0,
                y: 0.0,
                z: 0.0,
            },
            angular_velocity: Default::default(),
        }
    }

    fn scenario(actors: Vec<ScenarioActor>) -> ScenarioConfig {
        ScenarioConfig {
            ticks: 10,
            primary_subject: Some(Location::default()),
            external_context_ticks: 0,
            actors,
        }
    }

    #[test]
    fn test_spawn_initial_only_takes_tick_zero() {
        let mut world = MockWorld::new();
        let mut factory = ActorFactory::new(scenario(vec![scripted("A", 0), scripted("B", 3)]));

        let ids = factory.spawn_initial(&mut world).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(world.has_skeleton(ids[0]));
        assert!(world.primary_subject_location().is_some());
        assert!(factory.actor_id("B").is_none());

        let report = factory.apply_tick(&mut world, 3);
        assert_eq!(report.spawned.len(), 1);
        assert_eq!(factory.live_count(), 2);
    }

    #[test]
    fn test_initial_spawn_rolls_back_on_failure() {
        let mut world = MockWorld::with_config(MockConfig {
            fail_spawns: vec!["B".into()],
        });
        let mut factory = ActorFactory::new(scenario(vec![scripted("A", 0), scripted("B", 0)]));

        assert!(factory.spawn_initial(&mut world).is_err());
        assert_eq!(world.actor_count(), 0);
        assert_eq!(factory.live_count(), 0);
    }

    #[test]
    fn test_scripted_events() {
        let mut a = scripted("A", 0);
        a.stop_moving_tick = Some(2);
        a.hit_tick = Some(2);
        a.destroy_tick = Some(4);

        let mut world = MockWorld::new();
        let mut factory = ActorFactory::new(scenario(vec![a]));
        let id = factory.spawn_initial(&mut world).unwrap()[0];

        assert!(factory.apply_tick(&mut world, 1).is_empty());
        let report = factory.apply_tick(&mut world, 2);
        assert_eq!(report.stopped, vec![id]);
        assert_eq!(report.hit, vec![id]);

        let before = world.actor_transform(id).unwrap();
        world.step(1.0);
        assert_eq!(world.actor_transform(id).unwrap(), before);

        let report = factory.apply_tick(&mut world, 4);
        assert_eq!(report.destroyed, vec![id]);
        assert!(!world.actor_exists(id));
        assert!(factory.require("A").is_err());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut world = MockWorld::new();
        let mut factory = ActorFactory::new(scenario(vec![scripted("A", 0), scripted("B", 0)]));
        factory.spawn_initial(&mut world).unwrap();

        factory.teardown(&mut world);
        factory.teardown(&mut world);
        assert_eq!(world.actor_count(), 0);
    }
}
