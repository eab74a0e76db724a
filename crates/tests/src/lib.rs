//! # Integration Tests
//!
//! End-to-end scenarios over the mock scene host.
//!
//! Covers:
//! - contract snapshots
//! - capture-to-bake flows (`MockWorld` + `SessionManager` + `BakeQueue`)
//! - config-driven scenario runs writing real files

#[cfg(test)]
mod contract_tests {
    use contracts::{BakeStatus, CaptureBlueprint, ConfigVersion};

    #[test]
    fn test_contracts_compile() {
        let _ = ConfigVersion::V1;
        assert_eq!(CaptureBlueprint::default().session.export_fps, 30);
    }

    #[test]
    fn test_demo_config_loads() {
        let text = include_str!("../../../capture.toml");
        let blueprint =
            config_loader::ConfigLoader::load_from_str(text, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(blueprint.targets.len(), 1);
        assert_eq!(blueprint.sinks.len(), 2);
        assert!(blueprint.rules[0].auto_stop.stop_when_out_of_radius);
        assert_eq!(blueprint.scenario.unwrap().actors.len(), 4);
    }

    #[test]
    fn test_bake_status_snapshot() {
        let status = BakeStatus {
            jobs_done: 1,
            total_jobs: 3,
            current_job_name: "Mocap_Walker_1".into(),
            is_baking: true,
            awaiting_external_context_end: false,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jobs_done": 1,
                "total_jobs": 3,
                "current_job_name": "Mocap_Walker_1",
                "is_baking": true,
                "awaiting_external_context_end": false
            })
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use actor_factory::{ActorFactory, ManualScheduler, MockWorld, SkeletonBlueprint};
    use baker::{BakeOutcome, SinkSet};
    use capture_engine::{Recorder, RecorderConfig, RecorderState};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ActorId, AssetHandle, AssetSink, BakedAnimation, CaptureMode, ContractError,
        RecordingSnapshot, Transform,
    };
    use nalgebra::Vector3;
    use session::{SessionManager, SessionSettings, StopReason};

    const DT: f64 = 1.0 / 60.0;

    /// Keeps every committed asset in memory
    #[derive(Default)]
    struct CollectSink {
        committed: Vec<BakedAnimation>,
    }

    impl AssetSink for CollectSink {
        fn name(&self) -> &str {
            "collect"
        }

        async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
            self.committed.push(asset.clone());
            Ok(AssetHandle {
                sink: "collect".into(),
                location: asset.object_path(),
            })
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn setup() -> (MockWorld, SessionManager<ManualScheduler>) {
        let session = SessionManager::new(SessionSettings::default(), ManualScheduler::new());
        let mut world = MockWorld::new();
        world.attach_events(session.event_sender());
        (world, session)
    }

    fn flat_chain() -> SkeletonBlueprint {
        SkeletonBlueprint::chain(&[
            ("root", Vector3::zeros()),
            ("spine", Vector3::zeros()),
            ("head", Vector3::zeros()),
        ])
        .unwrap()
    }

    fn body_chain() -> SkeletonBlueprint {
        SkeletonBlueprint::chain(&[
            ("root", Vector3::zeros()),
            ("spine", Vector3::new(0.0, 0.0, 10.0)),
            ("head", Vector3::new(0.0, 0.0, 5.0)),
        ])
        .unwrap()
    }

    fn walker_rule(session: &mut SessionManager<ManualScheduler>) {
        let rule = session.add_rule();
        session.set_rule_class(rule, Some("Walker".into())).unwrap();
    }

    async fn drain<K: AssetSink>(
        session: &mut SessionManager<ManualScheduler>,
        world: &MockWorld,
        sink: &mut K,
    ) {
        while session.is_baking() {
            session.tick_bake(world, sink).await;
        }
    }

    /// Bones root(-1), spine(0), head(1); 3 identity frames at 60 Hz baked
    /// at 30 fps give 2 identity keys per bone
    #[tokio::test]
    async fn test_three_bone_identity_bake() {
        let (mut world, mut session) = setup();
        let actor = world.spawn_skeletal("Performer", &["Character"], flat_chain(), Transform::identity());
        session
            .add_target(&world, actor, CaptureMode::Skeletal, Some("Mocap_Performer".into()))
            .unwrap();

        session.start_session(&world).unwrap();
        for _ in 0..3 {
            session.tick(&world);
        }
        assert_eq!(session.stop_session(&world), 1);

        let mut sink = CollectSink::default();
        drain(&mut session, &world, &mut sink).await;

        assert_eq!(sink.committed.len(), 1);
        let anim = &sink.committed[0];
        assert_eq!(anim.frame_rate, 30);
        assert_eq!(anim.frame_count, 2);
        assert!(anim.track("root").is_some());
        for track in &anim.tracks {
            assert_eq!(track.positions.len(), 2);
            assert!(track.positions.iter().all(|p| p.norm() < 1e-12));
            assert!(track.rotations.iter().all(|r| r.angle() < 1e-12));
            assert!(track.scales.iter().all(|s| *s == Vector3::repeat(1.0)));
        }
    }

    /// Speed threshold 5, hold 0.25 s, 60 Hz: stops on the 15th stationary
    /// tick, not the 14th
    #[test]
    fn test_stationary_auto_stop_timing() {
        let (mut world, mut session) = setup();
        walker_rule(&mut session);
        let actor = world.spawn_skeletal("Idle", &["Walker"], body_chain(), Transform::identity());

        session.start_session(&world).unwrap();
        assert_eq!(session.tick(&world).started, vec![actor]);

        for _ in 1..=14 {
            assert!(session.tick(&world).stopped.is_empty());
        }
        assert_eq!(session.active_instance_count(), 1);

        let report = session.tick(&world);
        assert_eq!(report.stopped, vec![(actor, StopReason::Stationary)]);
        assert_eq!(session.active_instance_count(), 0);

        let job = &session.bake_queue().jobs()[0];
        assert_eq!(job.snapshot.frame_count(), 16);
        assert!(job.asset_name.starts_with("Mocap_Idle_"));
        // still recording: the rule stays enabled
        assert!(session.is_recording());
    }

    fn record_runner(preserve: bool) -> RecordingSnapshot {
        let (mut world, mut session) = setup();
        let actor = world.spawn_skeletal(
            "Runner",
            &["Character"],
            body_chain(),
            Transform::translation(50.0, 20.0, 0.0),
        );
        world.set_velocity(actor, Vector3::new(100.0, 0.0, 0.0));
        session.set_preserve_starting_location(preserve);
        session
            .add_target(&world, actor, CaptureMode::Skeletal, Some("Run".into()))
            .unwrap();

        session.start_session(&world).unwrap();
        for _ in 0..5 {
            session.tick(&world);
            world.step(DT);
        }
        session.stop_session(&world);
        session.bake_queue().jobs()[0].snapshot.clone()
    }

    #[test]
    fn test_preserve_origin_vs_rebase_to_start() {
        let preserved = record_runner(true);
        let rebased = record_runner(false);

        let first_rebased = rebased.frames[0].translations[0];
        let first_preserved = preserved.frames[0].translations[0];
        assert!(first_rebased.norm() < 1e-9);
        assert!((first_preserved - Vector3::new(50.0, 20.0, 0.0)).norm() < 1e-9);

        // same motion, shifted by the start location
        for (p, r) in preserved.frames.iter().zip(&rebased.frames) {
            let shift = p.translations[0] - r.translations[0];
            assert!((shift - Vector3::new(50.0, 20.0, 0.0)).norm() < 1e-9);
            // child bones are local to their parent and unaffected
            assert!((p.translations[1] - r.translations[1]).norm() < 1e-9);
        }
    }

    #[test]
    fn test_pre_roll_timeline() {
        let (mut world, mut session) = setup();
        walker_rule(&mut session);
        session.start_session(&world).unwrap();
        for _ in 0..4 {
            session.tick(&world);
            world.step(DT);
        }

        let actor = world.spawn_skeletal(
            "Latecomer",
            &["Walker"],
            body_chain(),
            Transform::translation(0.0, 5.0, 0.0),
        );
        world.set_velocity(actor, Vector3::new(200.0, 0.0, 0.0));
        assert_eq!(session.tick(&world).started, vec![actor]);

        let rec = session.auto_recorder(actor).unwrap();
        assert_eq!(rec.start_sample_index(), 4);
        let frames = rec.frames();
        assert_eq!(frames.len(), 5);
        for (k, frame) in frames.iter().enumerate() {
            assert!((frame.time - k as f64 * DT).abs() < 1e-12);
        }
        for frame in &frames[..4] {
            assert_eq!(frame.translations, frames[4].translations);
            assert_eq!(frame.rotations, frames[4].rotations);
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut world, mut session) = setup();
        let actor = world.spawn_skeletal("A", &["Character"], body_chain(), Transform::identity());

        let mut rec = Recorder::for_target(actor, RecorderConfig::default());
        rec.start(&world).unwrap();
        rec.sample(&world).unwrap();
        rec.stop();
        rec.stop();
        assert_eq!(rec.state(), RecorderState::Idle);
        assert_eq!(rec.frame_count(), 2);

        session
            .add_target(&world, actor, CaptureMode::Skeletal, None)
            .unwrap();
        session.start_session(&world).unwrap();
        session.tick(&world);
        assert_eq!(session.stop_session(&world), 1);
        assert_eq!(session.stop_session(&world), 0);
        assert_eq!(session.bake_queue().jobs().len(), 1);
    }

    async fn bake_spinning_take() -> BakedAnimation {
        let (mut world, mut session) = setup();
        let actor = world.spawn_skeletal("Dancer", &["Character"], body_chain(), Transform::identity());
        world.set_velocity(actor, Vector3::new(30.0, -12.0, 4.0));
        world.set_angular_velocity(actor, Vector3::new(0.0, 0.0, 1.5));
        session
            .add_target(&world, actor, CaptureMode::Skeletal, Some("Spin".into()))
            .unwrap();
        session.set_export_fps(24);

        session.start_session(&world).unwrap();
        for _ in 0..17 {
            session.tick(&world);
            world.step(DT);
        }
        session.stop_session(&world);

        let mut sink = CollectSink::default();
        drain(&mut session, &world, &mut sink).await;
        sink.committed.remove(0)
    }

    #[tokio::test]
    async fn test_bake_is_deterministic() {
        let a = bake_spinning_take().await;
        let b = bake_spinning_take().await;
        assert_eq!(a, b);
        assert_eq!(a.frame_rate, 24);
    }

    #[tokio::test]
    async fn test_bake_waits_for_external_context() {
        let (mut world, mut session) = setup();
        let actor = world.spawn_skeletal("A", &["Character"], body_chain(), Transform::identity());
        session
            .add_target(&world, actor, CaptureMode::Skeletal, Some("Take".into()))
            .unwrap();
        session.start_session(&world).unwrap();
        session.tick(&world);
        session.tick(&world);

        world.set_external_context_active(true);
        session.stop_session(&world);
        assert!(session.bake_status().awaiting_external_context_end);

        let mut sink = CollectSink::default();
        for _ in 0..3 {
            let outcome = session.tick_bake(&world, &mut sink).await;
            assert!(matches!(outcome, Some(BakeOutcome::Deferred)));
        }
        assert!(sink.committed.is_empty());

        world.set_external_context_active(false);
        let outcome = session.tick_bake(&world, &mut sink).await;
        assert!(matches!(outcome, Some(BakeOutcome::Baked { .. })));
        assert!(!session.is_baking());
        assert_eq!(sink.committed.len(), 1);
    }

    #[test]
    fn test_transform_only_prop_target() {
        let (mut world, mut session) = setup();
        let prop = world.spawn_prop("Camera", &["CameraRig"], Transform::translation(1.0, 2.0, 3.0));
        session
            .add_target(&world, prop, CaptureMode::TransformOnly, Some("Cam".into()))
            .unwrap();
        session.start_session(&world).unwrap();
        session.tick(&world);
        session.stop_session(&world);

        let snapshot = &session.bake_queue().jobs()[0].snapshot;
        assert_eq!(snapshot.capture_mode, CaptureMode::TransformOnly);
        assert_eq!(snapshot.bone_count(), 1);
        assert!((snapshot.frames[0].translations[0] - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }

    const SCENARIO: &str = r#"
[session]
capture_sample_rate_hz = 60.0
export_fps = 30

[[rules]]
actor_class = "Walker"

[[sinks]]
name = "json"
sink_type = "file"

[[sinks]]
name = "bvh"
sink_type = "bvh"

[scenario]
ticks = 30

[[scenario.actors]]
name = "Walker_1"
class_chain = ["Walker", "Character"]
velocity = { x = 120.0, y = 0.0, z = 0.0 }
destroy_tick = 20
bones = [
    { name = "root", parent = -1 },
    { name = "spine", parent = 0, offset = { x = 0.0, y = 0.0, z = 10.0 } },
    { name = "head", parent = 1, offset = { x = 0.0, y = 0.0, z = 5.0 } },
]

[[scenario.actors]]
name = "Crate_1"
class_chain = ["Prop"]
spawn_tick = 3
"#;

    /// Config -> scripted scene -> session -> file and BVH sinks
    #[tokio::test]
    async fn test_scenario_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = ConfigLoader::load_from_str(SCENARIO, ConfigFormat::Toml).unwrap();
        let scenario = blueprint.scenario.clone().unwrap();

        let mut world = MockWorld::new();
        let mut session = SessionManager::from_blueprint(&blueprint, ManualScheduler::new());
        world.attach_events(session.event_sender());
        let mut factory = ActorFactory::new(scenario.clone());
        factory.spawn_initial(&mut world).unwrap();
        let walker: ActorId = factory.require("Walker_1").unwrap();

        session.start_session(&world).unwrap();
        let mut stop_tick = None;
        for tick in 0..scenario.ticks {
            factory.apply_tick(&mut world, tick);
            let report = session.tick(&world);
            if report.stopped.contains(&(walker, StopReason::Destroyed)) {
                stop_tick = Some(tick);
            }
            world.step(session.settings().sample_interval());
        }
        assert_eq!(stop_tick, Some(20));
        session.stop_session(&world);

        let mut sinks = SinkSet::from_configs(&blueprint.sinks, Some(dir.path())).unwrap();
        drain(&mut session, &world, &mut sinks).await;
        assert_eq!(session.stats().summary().stop_reasons["destroyed"], 1);
        assert_eq!(session.stats().baked, 1);

        let out = dir.path().join("MocapCaptures");
        let mut names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("Mocap_Walker_1_")));
        assert!(names[0].ends_with(".bvh"));
        assert!(names[1].ends_with(".json"));

        let text = std::fs::read_to_string(out.join(&names[1])).unwrap();
        let anim: BakedAnimation = serde_json::from_str(&text).unwrap();
        // 20 frames at 60 Hz span 19/60 s: 10 keys at 30 fps
        assert_eq!(anim.frame_count, 10);
        assert_eq!(anim.skeleton.bone_count(), 3);

        let bvh = std::fs::read_to_string(out.join(&names[0])).unwrap();
        assert!(bvh.starts_with("HIERARCHY\nROOT root"));
        assert!(bvh.contains("Frames: 10"));
    }
}
