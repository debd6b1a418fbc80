//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional and falls back to its
//! default, so `{}` is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};
use crate::observability::{Logger, Severity};

/// Configuration for a [`ComponentsEngine`](super::ComponentsEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capability type whose object variants are expanded (default: "display")
    pub display_capability: String,

    /// Memoize capability expansion (default: true)
    pub expansion_cache_enabled: bool,

    /// Memoize restriction matching (default: true)
    pub match_cache_enabled: bool,

    /// Entry cap per cache, 0 = unbounded (default: 0)
    pub cache_max_entries: usize,

    /// Minimum log severity: trace, info, warn or error (default: "info").
    /// Process-wide; applied by [`EngineConfig::apply_log_level`].
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            display_capability: "display".to_string(),
            expansion_cache_enabled: true,
            match_cache_enabled: true,
            cache_max_entries: 0,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Config with both caches turned off
    pub fn uncached() -> Self {
        Self {
            expansion_cache_enabled: false,
            match_cache_enabled: false,
            ..Self::default()
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.display_capability.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "display_capability must not be empty".to_string(),
            ));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn or error.",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Minimum log severity, `Info` if the level is not recognized
    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    /// Make `log_level` the minimum severity of the process-wide logger
    pub fn apply_log_level(&self) {
        Logger::set_min_severity(self.severity());
    }
}
