//! CLI command implementations
//!
//! Each command loads its configuration first, then applies the configured
//! log level before doing any work, so every event it emits is filtered
//! consistently.

use std::path::Path;

use serde_json::Value;

use crate::capabilities::CapabilityExpander;
use crate::distribution::{ComponentsDistribution, ComponentsEngine, EngineConfig, Facts};
use crate::observability::{log_event_with_fields, Event};
use crate::restrictions::parse_restrictions;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_descriptor, read_state, write_error, write_response, SessionState};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command).inspect_err(|e| {
        // stdout may be gone; the caller still reports on stderr
        let _ = write_error(e.code_str(), e.message());
    })
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Evaluate {
            state,
            config,
            ignore_manual,
        } => evaluate(&state, config.as_deref(), ignore_manual),
        Command::Expand { device, config } => expand(&device, config.as_deref()),
    }
}

/// Run the engine once over a session state file and print the facts
pub fn evaluate(state_path: &Path, config_path: Option<&Path>, ignore_manual: bool) -> CliResult<()> {
    let config = load_config(config_path)?;
    let state = read_state(state_path)?;
    log_event_with_fields(
        Event::StateLoaded,
        &[
            ("instances", &state.instances.len().to_string()),
            ("path", &state_path.display().to_string()),
            ("proxemics", &state.proxemics.len().to_string()),
        ],
    );

    let facts = run_session(state, config, ignore_manual)?;
    write_response(serde_json::to_value(&facts)?)
}

/// Expand the descriptor on stdin and print it
pub fn expand(device_uuid: &str, config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let raw = read_descriptor()?;

    let mut expander = CapabilityExpander::new(config.display_capability);
    let expanded = expander.expand(device_uuid, &raw);
    write_response(Value::from(expanded))
}

/// Build an engine from `state` and run it once
pub fn run_session(state: SessionState, config: EngineConfig, ignore_manual: bool) -> CliResult<Facts> {
    let mut engine = ComponentsEngine::with_config(
        state.local_instance_uuid,
        state.local_device_uuid,
        config,
    );
    engine.set_restrictions(parse_restrictions(&state.restrictions));
    engine.set_proxemics(state.proxemics);
    engine.set_instances(state.instances);
    if let Some(components) = state.current_components_distribution {
        engine.set_current_distribution(ComponentsDistribution::automatic(components));
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_failed(format!("Failed to create tokio runtime: {}", e)))?;

    Ok(rt.block_on(engine.run(ignore_manual)))
}

/// Load the config file if one was given, and apply its log level
fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_log_level();
    if let Some(path) = path {
        log_event_with_fields(Event::ConfigLoaded, &[("path", &path.display().to_string())]);
    }
    Ok(config)
}
