//! JSON I/O handling for CLI
//!
//! - Input: a session state file, or a single JSON document on stdin
//! - Output: a single JSON object on stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::capabilities::{DeviceCapabilities, Proxemics};
use crate::distribution::{ComponentsMap, Instance};

/// Session snapshot as persisted by the synchronization layer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Component name → restriction; anything other than an object means none
    #[serde(default)]
    pub restrictions: Value,
    #[serde(default)]
    pub proxemics: Proxemics,
    #[serde(default)]
    pub instances: Vec<Instance>,
    pub local_instance_uuid: String,
    pub local_device_uuid: String,
    /// Distribution computed by a previous run
    #[serde(default)]
    pub current_components_distribution: Option<ComponentsMap>,
}

/// Read a session state file
pub fn read_state(path: &Path) -> CliResult<SessionState> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read state {:?}: {}", path, e)))?;

    serde_json::from_str(&content)
        .map_err(|e| CliError::invalid_state(format!("Invalid state JSON: {}", e)))
}

/// Read a capability descriptor from stdin
pub fn read_descriptor() -> CliResult<DeviceCapabilities> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;

    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    let value: Value = serde_json::from_str(&input)?;
    Ok(DeviceCapabilities::from(value))
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_minimal_state() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"localInstanceUuid": "i-1", "localDeviceUuid": "d-1"}}"#).unwrap();

        let state = read_state(file.path()).unwrap();
        assert_eq!(state.local_instance_uuid, "i-1");
        assert!(state.instances.is_empty());
        assert!(state.restrictions.is_null());
        assert!(state.current_components_distribution.is_none());
    }

    #[test]
    fn test_state_without_identity_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"restrictions": {{}}}}"#).unwrap();

        let err = read_state(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "PROXEMO_CLI_INVALID_STATE");
    }

    #[test]
    fn test_missing_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_state(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code_str(), "PROXEMO_CLI_IO_ERROR");
    }
}
