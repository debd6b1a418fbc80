//! CLI Session Tests
//!
//! Tests for the session-state path of the `evaluate` command:
//! - State files are read from disk and run once
//! - Config files change engine behavior
//! - Unusable input is reported with a stable error code

use std::io::Write;

use proxemo::cli::{read_state, run_session};
use proxemo::distribution::EngineConfig;
use serde_json::json;
use tempfile::NamedTempFile;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn session_json() -> String {
    json!({
        "localInstanceUuid": "i-tablet",
        "localDeviceUuid": "tablet",
        "restrictions": {
            "Sketchpad": {"display": {"pixelRatio": {"value": 2, "operator": ">="}}},
            "Chat": {"showByDefault": false}
        },
        "proxemics": {
            "tablet": {"display": [{"pixelDensity": 160}, {"pixelDensity": 320}]}
        },
        "instances": [{
            "instanceUuid": "i-tablet",
            "device": {"deviceUuid": "tablet", "capabilities": {}},
            "active": true
        }],
        "currentComponentsDistribution": {"Chat": true}
    })
    .to_string()
}

// =============================================================================
// Evaluate
// =============================================================================

/// A state file runs through the engine end to end.
#[test]
fn test_state_file_evaluated() {
    let file = write_file(&session_json());

    let state = read_state(file.path()).unwrap();
    let facts = run_session(state, EngineConfig::default(), false).unwrap();

    let distribution = facts.distribution();
    // second display variant has ratio 320 / 150
    assert_eq!(distribution.components["Sketchpad"], true);
    assert_eq!(distribution.components["Chat"], false);
    assert_eq!(facts.previous_distribution.components["Chat"], true);
}

/// The display capability name comes from the config file.
#[test]
fn test_config_selects_display_capability() {
    let file = write_file(&session_json());
    let config = write_file(r#"{"display_capability": "screens"}"#);

    let config = EngineConfig::load(config.path()).unwrap();
    let facts = run_session(read_state(file.path()).unwrap(), config, false).unwrap();

    // "display" variants are no longer expanded, so no ratio is known
    assert_eq!(facts.distribution().components["Sketchpad"], false);
}

/// A malformed state file is rejected with the state error code.
#[test]
fn test_malformed_state_rejected() {
    let file = write_file("{\"localInstanceUuid\": 7}");

    let err = read_state(file.path()).unwrap_err();

    assert_eq!(err.code_str(), "PROXEMO_CLI_INVALID_STATE");
}

/// Malformed restrictions degrade instead of failing the run.
#[test]
fn test_malformed_restrictions_degrade() {
    let file = write_file(
        &json!({
            "localInstanceUuid": "i-1",
            "localDeviceUuid": "d-1",
            "restrictions": ["not", "a", "map"],
            "instances": [{"instanceUuid": "i-1", "device": {"deviceUuid": "d-1"}, "active": true}]
        })
        .to_string(),
    );

    let facts = run_session(read_state(file.path()).unwrap(), EngineConfig::default(), false).unwrap();

    assert_eq!(facts.halted_by, Some("resolve-automatic"));
    assert!(facts.distribution().components.is_empty());
}
