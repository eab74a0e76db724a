//! Configuration validation
//!
//! Rules:
//! - field constraints declared on the blueprint types (ranges, non-empty names)
//! - asset path is a valid namespace
//! - target names and sink names are unique
//! - target output names are plain asset names (no path separators)
//! - rule thresholds are finite and non-negative
//! - session origin is finite
//! - scenario actors are unique and carry valid bone tables

use std::collections::HashSet;

use contracts::{
    is_valid_asset_name, is_valid_asset_path, CaptureBlueprint, ContractError, ScenarioConfig, SkeletonDescriptor,
    Validate,
};

/// Validate a CaptureBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    validate_declared_constraints(blueprint)?;
    validate_asset_path(blueprint)?;
    validate_session_origin(blueprint)?;
    validate_target_names(blueprint)?;
    validate_rule_thresholds(blueprint)?;
    validate_sinks(blueprint)?;
    if let Some(scenario) = &blueprint.scenario {
        validate_scenario(scenario)?;
    }
    Ok(())
}

fn validate_declared_constraints(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

fn validate_asset_path(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let path = &blueprint.session.asset_path;
    if !is_valid_asset_path(path) {
        return Err(ContractError::config_validation(
            "session.asset_path",
            format!("'{path}' is not a valid asset namespace (expected /Segment[/Segment...])"),
        ));
    }
    Ok(())
}

fn validate_session_origin(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    if !blueprint.session.session_origin.is_finite() {
        return Err(ContractError::config_validation(
            "session.session_origin",
            "origin must be finite",
        ));
    }
    if !blueprint.session.capture_sample_rate_hz.is_finite() {
        return Err(ContractError::config_validation(
            "session.capture_sample_rate_hz",
            "sample rate must be finite",
        ));
    }
    Ok(())
}

fn validate_target_names(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for target in &blueprint.targets {
        if !seen.insert(&target.actor_name) {
            return Err(ContractError::config_validation(
                format!("targets[actor_name={}]", target.actor_name),
                "duplicate target",
            ));
        }
        if let Some(name) = &target.output_name {
            if !is_valid_asset_name(name) {
                return Err(ContractError::config_validation(
                    format!("targets[actor_name={}].output_name", target.actor_name),
                    format!("'{name}' must use only ASCII letters, digits, '_' and '-'"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_rule_thresholds(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    for (idx, rule) in blueprint.rules.iter().enumerate() {
        let stop = &rule.auto_stop;
        let checks = [
            ("linear_speed_threshold", stop.linear_speed_threshold),
            ("stationary_hold_seconds", stop.stationary_hold_seconds),
            ("radius", stop.radius),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(ContractError::config_validation(
                    format!("rules[{idx}].auto_stop.{field}"),
                    format!("must be finite and >= 0, got {value}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}

fn validate_scenario(scenario: &ScenarioConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for actor in &scenario.actors {
        if !seen.insert(&actor.name) {
            return Err(ContractError::config_validation(
                format!("scenario.actors[name={}]", actor.name),
                "duplicate scenario actor",
            ));
        }
        if actor.class_chain.is_empty() {
            return Err(ContractError::config_validation(
                format!("scenario.actors[{}].class_chain", actor.name),
                "class chain cannot be empty",
            ));
        }
        if let Some(destroy) = actor.destroy_tick {
            if destroy < actor.spawn_tick {
                return Err(ContractError::config_validation(
                    format!("scenario.actors[{}].destroy_tick", actor.name),
                    format!(
                        "destroy_tick ({destroy}) must be >= spawn_tick ({})",
                        actor.spawn_tick
                    ),
                ));
            }
        }
        if !actor.bones.is_empty() {
            let names = actor.bones.iter().map(|b| b.name.clone()).collect();
            let parents = actor.bones.iter().map(|b| b.parent).collect();
            SkeletonDescriptor::new(names, parents).map_err(|e| {
                ContractError::config_validation(
                    format!("scenario.actors[{}].bones", actor.name),
                    e.to_string(),
                )
            })?;
        }
    }
    Ok(())
}
