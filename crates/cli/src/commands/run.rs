//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_capture(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        sample_rate_hz = blueprint.session.capture_sample_rate_hz,
        export_fps = blueprint.session.export_fps,
        targets = blueprint.targets.len(),
        rules = blueprint.rules.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        ticks: args.ticks,
        realtime: args.realtime,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
        output_dir: args.output.clone(),
    });

    info!("Starting capture...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Capture pipeline failed")?;

    info!(
        ticks = stats.ticks,
        recordings = stats.session.recordings,
        baked = stats.session.baked,
        duration_secs = stats.duration.as_secs_f64(),
        "Capture completed"
    );
    stats.print_summary();

    info!("Mocap capture finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the signal is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::CaptureBlueprint) {
    let session = &blueprint.session;
    println!("\n=== Configuration Summary ===\n");
    println!("Session:");
    println!("  Capture rate: {} Hz", session.capture_sample_rate_hz);
    println!("  Export fps: {}", session.export_fps);
    println!("  Asset path: {}", session.asset_path);
    println!("  Auto-bake on stop: {}", session.auto_bake_on_stop);

    println!("\nTargets ({}):", blueprint.targets.len());
    for target in &blueprint.targets {
        println!(
            "  - {} ({:?}){}",
            target.actor_name,
            target.capture_mode,
            if target.enabled { "" } else { " [disabled]" }
        );
    }

    println!("\nRules ({}):", blueprint.rules.len());
    for rule in &blueprint.rules {
        println!(
            "  - class={} tag={}{}",
            rule.actor_class.as_deref().unwrap_or("<none>"),
            rule.required_tag.as_deref().unwrap_or("<any>"),
            if rule.enabled { "" } else { " [disabled]" }
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    if let Some(scenario) = &blueprint.scenario {
        println!("\nScenario:");
        println!("  Ticks: {}", scenario.ticks);
        println!("  Actors: {}", scenario.actors.len());
    }

    println!();
}
