//! Engine metrics
//!
//! - Counters only, monotonic, reset only when the engine is created
//! - Atomic, so a shared reference is enough to record

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::CacheStats;

/// Counters for one engine instance
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Completed `run()` calls
    runs: AtomicU64,
    /// Runs that adopted a manual distribution
    manual_overrides: AtomicU64,
    /// Runs that kept the previous distribution
    previous_kept: AtomicU64,
    /// Runs resolved by capability matching
    automatic_resolutions: AtomicU64,
    /// Runs where no terminal rule fired
    chain_exhausted: AtomicU64,
}

impl EngineMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_runs(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_manual_overrides(&self) {
        self.manual_overrides.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_previous_kept(&self) {
        self.previous_kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_automatic_resolutions(&self) {
        self.automatic_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_chain_exhausted(&self) {
        self.chain_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get completed runs
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Snapshot of the run counters. Cache and fallback fields are left at
    /// zero; the engine fills them from the expander and matcher.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            manual_overrides: self.manual_overrides.load(Ordering::Relaxed),
            previous_kept: self.previous_kept.load(Ordering::Relaxed),
            automatic_resolutions: self.automatic_resolutions.load(Ordering::Relaxed),
            chain_exhausted: self.chain_exhausted.load(Ordering::Relaxed),
            ..MetricsSnapshot::default()
        }
    }
}

/// A point-in-time snapshot of all engine metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub manual_overrides: u64,
    pub previous_kept: u64,
    pub automatic_resolutions: u64,
    pub chain_exhausted: u64,
    pub forgiven_entries: u64,
    pub expansion_cache: CacheStats,
    pub match_cache: CacheStats,
}

impl MetricsSnapshot {
    /// Serialize as a single JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = EngineMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = EngineMetrics::new();

        metrics.increment_runs();
        metrics.increment_runs();
        metrics.increment_manual_overrides();
        metrics.increment_previous_kept();
        metrics.increment_automatic_resolutions();
        metrics.increment_chain_exhausted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs, 2);
        assert_eq!(snapshot.manual_overrides, 1);
        assert_eq!(snapshot.previous_kept, 1);
        assert_eq!(snapshot.automatic_resolutions, 1);
        assert_eq!(snapshot.chain_exhausted, 1);
    }

    #[test]
    fn test_to_json() {
        let metrics = EngineMetrics::new();
        metrics.increment_runs();

        let parsed: serde_json::Value = serde_json::from_str(&metrics.snapshot().to_json()).unwrap();
        assert_eq!(parsed["runs"], 1);
        assert_eq!(parsed["match_cache"]["hits"], 0);
    }
}
