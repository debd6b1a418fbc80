//! # Distribution Errors
//!
//! The engine itself never fails on partial input. Errors only arise when
//! loading configuration or talking to an engine task that has stopped.

use std::io;

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for [`EngineHandle`](super::EngineHandle) calls
pub type HandleResult<T> = Result<T, HandleError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Read(#[from] io::Error),

    /// Config file is not valid JSON for [`EngineConfig`](super::EngineConfig)
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Config parsed but a value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine handle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The engine task has exited
    #[error("Engine task stopped")]
    EngineStopped,
}
