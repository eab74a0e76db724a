//! Pipeline orchestrator - coordinates scene, session and bake queue.
//!
//! The scene is a `MockWorld` scripted by the configuration's scenario.
//! Session ticks and bake ticks either run back to back or, in realtime
//! mode, on tokio intervals matching the registered timer periods.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use actor_factory::{ActorFactory, ManualScheduler, MockWorld};
use anyhow::{Context, Result};
use baker::{BakeOutcome, SinkSet};
use contracts::CaptureBlueprint;
use session::SessionManager;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The capture blueprint
    pub blueprint: CaptureBlueprint,

    /// Session ticks to run (None = scenario length)
    pub ticks: Option<u64>,

    /// Pace ticks with wall-clock timers
    pub realtime: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Base directory override for file-backed sinks
    pub output_dir: Option<PathBuf>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

/// Wait for the next period in realtime mode, otherwise just yield
async fn pace(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

fn make_timer(realtime: bool, period: std::time::Duration) -> Option<Interval> {
    realtime.then(|| {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    })
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run capture until the scenario ends, the session ends itself or
    /// `shutdown` resolves; then bake everything that was recorded
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let scenario = blueprint.scenario.clone().ok_or(CliError::MissingScenario)?;
        let total_ticks = self.config.ticks.unwrap_or(scenario.ticks);
        let external_context_ticks = scenario.external_context_ticks;

        // Scene
        let mut world = MockWorld::new();
        let mut session = SessionManager::from_blueprint(blueprint, ManualScheduler::new());
        world.attach_events(session.event_sender());

        let mut factory = ActorFactory::new(scenario);
        factory
            .spawn_initial(&mut world)
            .map_err(|e| CliError::scenario(e.to_string()))?;
        info!(actors = factory.live_count(), "Scenario actors spawned");

        for target in &blueprint.targets {
            session
                .add_target_config(&world, target)
                .with_context(|| format!("Failed to add target '{}'", target.actor_name))?;
        }

        // Sinks
        let mut sinks = SinkSet::from_configs(&blueprint.sinks, self.config.output_dir.as_deref())
            .context("Failed to create sinks")?;
        info!(sinks = sinks.len(), "Sinks ready");

        // Capture
        session
            .start_session(&world)
            .context("Failed to start capture session")?;

        let dt = session.settings().sample_interval();
        let mut tick_timer = make_timer(self.config.realtime, session.settings().tick_interval());
        let mut stats = PipelineStats::default();

        tokio::pin!(shutdown);
        info!(ticks = total_ticks, realtime = self.config.realtime, "Capture running");

        for tick in 0..total_ticks {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!(tick, "Received shutdown signal, stopping capture...");
                    stats.interrupted = true;
                    break;
                }
                _ = pace(&mut tick_timer) => {}
            }

            let script = factory.apply_tick(&mut world, tick);
            if !script.is_empty() {
                debug!(tick, ?script, "Scenario events applied");
            }

            let report = session.tick(&world);
            stats.ticks += 1;
            for (actor, reason) in &report.stopped {
                debug!(actor = %actor, reason = %reason, "Auto-capture stopped");
            }
            if report.session_ended {
                stats.session_ended = true;
                break;
            }

            world.step(dt);
        }

        // Bake
        world.set_external_context_active(external_context_ticks > 0);
        let queued = session.stop_session(&world);
        info!(jobs = queued, "Capture stopped, baking");

        let mut bake_timer = make_timer(self.config.realtime, session.settings().bake_interval);
        let mut external_remaining = external_context_ticks;
        while session.is_baking() {
            pace(&mut bake_timer).await;

            match session.tick_bake(&world, &mut sinks).await {
                Some(BakeOutcome::Deferred) => debug!("Bake deferred"),
                Some(outcome) => debug!(outcome = outcome.label(), "Bake tick"),
                None => {}
            }

            if external_remaining > 0 {
                external_remaining -= 1;
                if external_remaining == 0 {
                    world.set_external_context_active(false);
                    info!("External context ended");
                }
            }
        }

        // Cleanup
        factory.teardown(&mut world);

        stats.live_actors = world.actor_count();
        stats.bake = session.bake_status();
        stats.session = session.stats().summary();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            recordings = stats.session.recordings,
            baked = stats.session.baked,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use std::future::pending;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
[session]
capture_sample_rate_hz = 60.0
export_fps = 30

[[rules]]
actor_class = "Walker"

[[sinks]]
name = "files"
sink_type = "file"

[scenario]
ticks = 40
external_context_ticks = 3

[[scenario.actors]]
name = "Walker_1"
class_chain = ["Walker", "Character"]
velocity = { x = 150.0, y = 0.0, z = 0.0 }
stop_moving_tick = 10
bones = [
    { name = "root", parent = -1 },
    { name = "spine", parent = 0, offset = { x = 0.0, y = 0.0, z = 10.0 } },
]
"#;

    fn blueprint() -> CaptureBlueprint {
        ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_run_bakes_stationary_stop() {
        let dir = tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(),
            ticks: None,
            realtime: false,
            metrics_port: None,
            output_dir: Some(dir.path().to_path_buf()),
        });

        let stats = pipeline.run(pending::<()>()).await.unwrap();

        assert!(!stats.interrupted);
        // stops moving at tick 10, stationary for 15 ticks afterwards
        assert_eq!(stats.session.stop_reasons.get("stationary"), Some(&1));
        assert_eq!(stats.session.baked, 1);
        assert_eq!(stats.bake.total_jobs, 1);
        assert_eq!(stats.live_actors, 0);

        let written: Vec<_> = std::fs::read_dir(dir.path().join("MocapCaptures"))
            .unwrap()
            .collect();
        assert_eq!(written.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_scenario_is_an_error() {
        let mut bp = blueprint();
        bp.scenario = None;
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: bp,
            ticks: None,
            realtime: false,
            metrics_port: None,
            output_dir: None,
        });
        let err = pipeline.run(pending::<()>()).await.unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let dir = tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(),
            ticks: Some(1000),
            realtime: false,
            metrics_port: None,
            output_dir: Some(dir.path().to_path_buf()),
        });
        let stats = pipeline.run(std::future::ready(())).await.unwrap();
        assert!(stats.interrupted);
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.bake.total_jobs, 0);
    }
}
