//! CLI-specific error types
//!
//! Every CLI error is fatal: it is reported once and the process exits non-zero.

use std::fmt;
use std::io;

use crate::distribution::ConfigError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdin/stdout)
    IoError,
    /// Session state file unusable
    InvalidState,
    /// Async runtime could not start
    RuntimeFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "PROXEMO_CLI_CONFIG_ERROR",
            Self::IoError => "PROXEMO_CLI_IO_ERROR",
            Self::InvalidState => "PROXEMO_CLI_INVALID_STATE",
            Self::RuntimeFailed => "PROXEMO_CLI_RUNTIME_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Invalid session state
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidState, msg)
    }

    /// Runtime failed to start
    pub fn runtime_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::invalid_state("missing localInstanceUuid");
        assert_eq!(
            err.to_string(),
            "PROXEMO_CLI_INVALID_STATE: missing localInstanceUuid"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err = CliError::from(ConfigError::Invalid("bad".to_string()));
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert_eq!(err.message(), "Invalid config: bad");
    }
}
