//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::CaptureBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    capture_sample_rate_hz: f64,
    export_fps: u32,
    target_count: usize,
    rule_count: usize,
    sink_count: usize,
    scenario_actor_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    capture_sample_rate_hz: blueprint.session.capture_sample_rate_hz,
                    export_fps: blueprint.session.export_fps,
                    target_count: blueprint.targets.len(),
                    rule_count: blueprint.rules.len(),
                    sink_count: blueprint.sinks.len(),
                    scenario_actor_count: blueprint
                        .scenario
                        .as_ref()
                        .map_or(0, |s| s.actors.len()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CaptureBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - baked assets are only logged".to_string());
    }

    for (idx, rule) in blueprint.rules.iter().enumerate() {
        if rule.actor_class.is_none() {
            warnings.push(format!("rules[{idx}] has no actor_class and never matches"));
        }
    }

    let live_rule = blueprint
        .rules
        .iter()
        .any(|r| r.enabled && r.actor_class.is_some());
    let enabled_target = blueprint.targets.iter().any(|t| t.enabled);
    if !live_rule && !enabled_target {
        warnings.push("No enabled targets or rules - the session ends on its first tick".to_string());
    }

    let session = &blueprint.session;
    if f64::from(session.export_fps) > session.capture_sample_rate_hz {
        warnings.push(format!(
            "export_fps ({}) exceeds capture rate ({} Hz) - baked keys will repeat",
            session.export_fps, session.capture_sample_rate_hz
        ));
    }

    let rule_bakes = blueprint
        .rules
        .iter()
        .any(|r| r.auto_stop.auto_bake_on_auto_stop);
    if !session.auto_bake_on_stop && !rule_bakes {
        warnings.push("Auto-bake is disabled everywhere - nothing will be baked".to_string());
    }

    if blueprint.scenario.is_none() {
        warnings.push("No [scenario] section - the `run` command needs one".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Capture rate: {} Hz", summary.capture_sample_rate_hz);
            println!("  Export fps: {}", summary.export_fps);
            println!("  Targets: {}", summary.target_count);
            println!("  Rules: {}", summary.rule_count);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Scenario actors: {}", summary.scenario_actor_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ClassRuleConfig;

    #[test]
    fn test_warnings_for_empty_blueprint() {
        let warnings = collect_warnings(&CaptureBlueprint::default());
        assert!(warnings.iter().any(|w| w.contains("No sinks")));
        assert!(warnings.iter().any(|w| w.contains("first tick")));
        assert!(warnings.iter().any(|w| w.contains("[scenario]")));
    }

    #[test]
    fn test_classless_rule_warning() {
        let blueprint = CaptureBlueprint {
            rules: vec![ClassRuleConfig::default()],
            ..Default::default()
        };
        let warnings = collect_warnings(&blueprint);
        assert!(warnings.iter().any(|w| w.contains("rules[0]")));
    }
}
