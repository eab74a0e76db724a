//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{AutoStopSettings, CaptureBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    session: SessionInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    targets: Vec<TargetInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rules: Vec<RuleInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<ScenarioInfo>,
}

#[derive(Serialize)]
struct SessionInfo {
    capture_sample_rate_hz: f64,
    export_fps: u32,
    asset_path: String,
    auto_bake_on_stop: bool,
    preserve_starting_location: bool,
    max_active_auto_instances: usize,
}

#[derive(Serialize)]
struct TargetInfo {
    actor_name: String,
    enabled: bool,
    capture_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_name: Option<String>,
}

#[derive(Serialize)]
struct RuleInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    actor_class: Option<String>,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_tag: Option<String>,
    auto_stop: AutoStopSettings,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
struct ScenarioInfo {
    ticks: u64,
    external_context_ticks: u64,
    actors: Vec<ScenarioActorInfo>,
}

#[derive(Serialize)]
struct ScenarioActorInfo {
    name: String,
    class: String,
    bones: usize,
    spawn_tick: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &CaptureBlueprint) -> ConfigInfo {
    let session = &blueprint.session;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        session: SessionInfo {
            capture_sample_rate_hz: session.capture_sample_rate_hz,
            export_fps: session.export_fps,
            asset_path: session.asset_path.clone(),
            auto_bake_on_stop: session.auto_bake_on_stop,
            preserve_starting_location: session.preserve_starting_location,
            max_active_auto_instances: session.max_active_auto_instances,
        },
        targets: blueprint
            .targets
            .iter()
            .map(|t| TargetInfo {
                actor_name: t.actor_name.clone(),
                enabled: t.enabled,
                capture_mode: format!("{:?}", t.capture_mode),
                output_name: t.output_name.clone(),
            })
            .collect(),
        rules: blueprint
            .rules
            .iter()
            .map(|r| RuleInfo {
                actor_class: r.actor_class.clone(),
                enabled: r.enabled,
                required_tag: r.required_tag.clone(),
                auto_stop: r.auto_stop,
            })
            .collect(),
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                params: s.params.clone(),
            })
            .collect(),
        scenario: blueprint.scenario.as_ref().map(|s| ScenarioInfo {
            ticks: s.ticks,
            external_context_ticks: s.external_context_ticks,
            actors: s
                .actors
                .iter()
                .map(|a| ScenarioActorInfo {
                    name: a.name.clone(),
                    class: a.class_chain.first().cloned().unwrap_or_default(),
                    bones: a.bones.len(),
                    spawn_tick: a.spawn_tick,
                })
                .collect(),
        }),
    }
}

fn tree_prefix(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(blueprint: &CaptureBlueprint) {
    println!("=== Mocap Capture Configuration ===\n");

    let session = &blueprint.session;
    println!("Session");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Capture rate: {} Hz", session.capture_sample_rate_hz);
    println!("   ├─ Export fps: {}", session.export_fps);
    println!("   ├─ Asset path: {}", session.asset_path);
    println!("   ├─ Auto-bake on stop: {}", session.auto_bake_on_stop);
    if session.preserve_starting_location {
        let o = &session.session_origin.location;
        println!("   └─ Baseline: session origin ({}, {}, {})", o.x, o.y, o.z);
    } else {
        println!("   └─ Baseline: each target's start pose");
    }

    println!("\nTargets ({})", blueprint.targets.len());
    for (i, target) in blueprint.targets.iter().enumerate() {
        println!(
            "   {} {} ({:?}){}",
            tree_prefix(i, blueprint.targets.len()),
            target.actor_name,
            target.capture_mode,
            if target.enabled { "" } else { " [disabled]" }
        );
    }

    println!("\nRules ({})", blueprint.rules.len());
    for (i, rule) in blueprint.rules.iter().enumerate() {
        let stop = &rule.auto_stop;
        println!(
            "   {} class={} tag={}{}",
            tree_prefix(i, blueprint.rules.len()),
            rule.actor_class.as_deref().unwrap_or("<none>"),
            rule.required_tag.as_deref().unwrap_or("<any>"),
            if rule.enabled { "" } else { " [disabled]" }
        );
        println!(
            "        stationary={} (< {} u/s for {} s), radius={} ({}), hit={}, destroyed={}, bake={}",
            stop.stop_when_nearly_stationary,
            stop.linear_speed_threshold,
            stop.stationary_hold_seconds,
            stop.stop_when_out_of_radius,
            stop.radius,
            stop.stop_on_hit,
            stop.stop_on_destroyed,
            stop.auto_bake_on_auto_stop
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            println!(
                "   {} {} ({:?})",
                tree_prefix(i, blueprint.sinks.len()),
                sink.name,
                sink.sink_type
            );
        }
    }

    if let Some(scenario) = &blueprint.scenario {
        println!("\nScenario ({} ticks)", scenario.ticks);
        for (i, actor) in scenario.actors.iter().enumerate() {
            println!(
                "   {} {} [{}] {} bones, spawns at tick {}",
                tree_prefix(i, scenario.actors.len()),
                actor.name,
                actor.class_chain.join(" < "),
                actor.bones.len(),
                actor.spawn_tick
            );
        }
    }

    println!();
}
