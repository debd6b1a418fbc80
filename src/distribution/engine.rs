//! # Components Engine
//!
//! Facade over the rule chain. The engine owns the current session state
//! (restrictions, proxemics, instances and local identity) and the last
//! computed distribution.
//!
//! # Invariants
//!
//! - State is only replaced between runs, never during one
//! - Each run starts from fresh [`Facts`]
//! - The stored distribution is overwritten, never merged, when a run ends
//! - Caches belong to this engine and are never shared

use super::config::EngineConfig;
use super::facts::Facts;
use super::rules::{
    ManualOverride, NoLocalInstance, ResolveAutomaticDistribution, Rule, RuleChain, RuleContext,
};
use super::types::{ComponentsDistribution, ComponentsMap, Instance};
use crate::cache::MemoCache;
use crate::capabilities::{CapabilityExpander, Proxemics};
use crate::observability::{log_event_with_fields, EngineMetrics, Event, MetricsSnapshot};
use crate::restrictions::{ConditionMatcher, Restrictions};

/// Decides component visibility for the local instance
pub struct ComponentsEngine {
    config: EngineConfig,
    chain: RuleChain,
    expander: CapabilityExpander,
    matcher: ConditionMatcher,
    metrics: EngineMetrics,

    restrictions: Restrictions,
    proxemics: Proxemics,
    instances: Vec<Instance>,
    local_instance_uuid: String,
    local_device_uuid: String,
    current_distribution: ComponentsDistribution,
}

impl ComponentsEngine {
    /// Create an engine with the default configuration
    ///
    /// Leaves the logger's minimum severity untouched.
    pub fn new(local_instance_uuid: impl Into<String>, local_device_uuid: impl Into<String>) -> Self {
        Self::build(local_instance_uuid.into(), local_device_uuid.into(), EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    ///
    /// The config's `log_level` becomes the process-wide minimum severity.
    pub fn with_config(
        local_instance_uuid: impl Into<String>,
        local_device_uuid: impl Into<String>,
        config: EngineConfig,
    ) -> Self {
        config.apply_log_level();
        Self::build(local_instance_uuid.into(), local_device_uuid.into(), config)
    }

    fn build(local_instance_uuid: String, local_device_uuid: String, config: EngineConfig) -> Self {
        let expansion_cache = if config.expansion_cache_enabled {
            MemoCache::new(config.cache_max_entries)
        } else {
            MemoCache::disabled()
        };
        let matcher = if config.match_cache_enabled {
            ConditionMatcher::with_capacity(config.cache_max_entries)
        } else {
            ConditionMatcher::uncached()
        };

        Self {
            expander: CapabilityExpander::with_cache(config.display_capability.clone(), expansion_cache),
            matcher,
            chain: RuleChain::new(),
            metrics: EngineMetrics::new(),
            config,
            restrictions: Restrictions::new(),
            proxemics: Proxemics::new(),
            instances: Vec::new(),
            local_instance_uuid,
            local_device_uuid,
            current_distribution: ComponentsDistribution::default(),
        }
    }

    /// Replace the rule chain
    pub fn with_chain(mut self, chain: RuleChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn set_restrictions(&mut self, restrictions: Restrictions) {
        self.restrictions = restrictions;
    }

    pub fn set_proxemics(&mut self, proxemics: Proxemics) {
        self.proxemics = proxemics;
    }

    pub fn set_instances(&mut self, instances: Vec<Instance>) {
        self.instances = instances;
    }

    pub fn set_local_identity(
        &mut self,
        local_instance_uuid: impl Into<String>,
        local_device_uuid: impl Into<String>,
    ) {
        self.local_instance_uuid = local_instance_uuid.into();
        self.local_device_uuid = local_device_uuid.into();
    }

    /// Seed the distribution a run falls back to when it cannot decide
    pub fn set_current_distribution(&mut self, distribution: ComponentsDistribution) {
        self.current_distribution = distribution;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn restrictions(&self) -> &Restrictions {
        &self.restrictions
    }

    pub fn proxemics(&self) -> &Proxemics {
        &self.proxemics
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn local_instance_uuid(&self) -> &str {
        &self.local_instance_uuid
    }

    pub fn local_device_uuid(&self) -> &str {
        &self.local_device_uuid
    }

    /// Visibility map of the last run
    pub fn current_components_distribution(&self) -> &ComponentsMap {
        &self.current_distribution.components
    }

    /// Distribution of the last run, including its `auto` flag
    pub fn current_distribution(&self) -> &ComponentsDistribution {
        &self.current_distribution
    }

    /// Run counters merged with cache and fallback statistics
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            forgiven_entries: self.matcher.forgiven_count(),
            expansion_cache: self.expander.cache_stats(),
            match_cache: self.matcher.cache_stats(),
            ..self.metrics.snapshot()
        }
    }

    /// Execute the rule chain once and store the resulting distribution.
    ///
    /// Returns the full facts of the run.
    pub async fn run(&mut self, ignore_manual: bool) -> Facts {
        self.evaluate(ignore_manual)
    }

    /// Blocking form of [`run`](Self::run)
    pub fn evaluate(&mut self, ignore_manual: bool) -> Facts {
        let facts = Facts::new(
            self.local_instance_uuid.clone(),
            self.local_device_uuid.clone(),
            ignore_manual,
        )
        .with_instances(self.instances.iter().cloned())
        .with_proxemics(self.proxemics.clone())
        .with_restrictions(self.restrictions.clone())
        .with_previous_distribution(self.current_distribution.clone());

        let run_id = facts.run_id.to_string();
        log_event_with_fields(
            Event::RunBegin,
            &[
                ("ignore_manual", if ignore_manual { "true" } else { "false" }),
                ("instance_uuid", &self.local_instance_uuid),
                ("run_id", &run_id),
            ],
        );

        let mut ctx = RuleContext {
            expander: &mut self.expander,
            matcher: &mut self.matcher,
        };
        let facts = self.chain.execute(facts, &mut ctx);

        self.record(facts.halted_by);
        self.current_distribution = facts.distribution();

        log_event_with_fields(
            Event::RunComplete,
            &[
                ("auto", if self.current_distribution.auto { "true" } else { "false" }),
                ("components", &self.current_distribution.components.len().to_string()),
                ("halted_by", facts.halted_by.unwrap_or("none")),
                ("run_id", &run_id),
            ],
        );
        facts
    }

    fn record(&self, halted_by: Option<&'static str>) {
        self.metrics.increment_runs();
        match halted_by {
            Some(name) if name == ManualOverride.name() => self.metrics.increment_manual_overrides(),
            Some(name) if name == NoLocalInstance.name() => self.metrics.increment_previous_kept(),
            Some(name) if name == ResolveAutomaticDistribution.name() => {
                self.metrics.increment_automatic_resolutions()
            }
            Some(_) => {}
            None => {
                self.metrics.increment_chain_exhausted();
                self.metrics.increment_previous_kept();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DeviceCapabilities;
    use crate::restrictions::parse_restrictions;
    use serde_json::json;

    fn caps(value: serde_json::Value) -> DeviceCapabilities {
        DeviceCapabilities::from(value)
    }

    fn single_device_engine() -> ComponentsEngine {
        let mut engine = ComponentsEngine::new("i-1", "d-1");
        engine.set_instances(vec![Instance::new("i-1", "d-1", caps(json!({"resolution": [1920, 1080]})))]);
        engine
    }

    #[tokio::test]
    async fn test_video_call_resolution_threshold() {
        let mut engine = single_device_engine();
        engine.set_restrictions(parse_restrictions(&json!({
            "VideoCall": {"resolution": {"value": [1280, 720], "operator": ">="}}
        })));

        let facts = engine.run(false).await;

        assert_eq!(facts.halted_by, Some("resolve-automatic"));
        assert_eq!(engine.current_components_distribution()["VideoCall"], true);
        assert!(engine.current_distribution().auto);
    }

    #[tokio::test]
    async fn test_hidden_by_default_single_device() {
        let mut engine = single_device_engine();
        engine.set_restrictions(parse_restrictions(&json!({
            "Chat": {"showByDefault": false, "resolution": {"value": [1280, 720], "operator": ">="}}
        })));

        engine.run(false).await;

        assert_eq!(engine.current_components_distribution()["Chat"], false);
        // pinned default, so nothing had to be matched
        assert_eq!(engine.metrics().match_cache.misses, 0);
    }

    #[tokio::test]
    async fn test_manual_override_wins() {
        let manual = ComponentsDistribution::manual(ComponentsMap::from([("Chat".to_string(), false)]));
        let mut engine = ComponentsEngine::new("i-1", "d-1");
        engine.set_instances(vec![
            Instance::new("i-1", "d-1", DeviceCapabilities::new()).with_distribution(manual.clone())
        ]);
        engine.set_restrictions(parse_restrictions(&json!({"Chat": {}, "Player": {}})));

        let facts = engine.run(false).await;

        assert_eq!(facts.halted_by, Some("manual-override"));
        assert_eq!(engine.current_distribution(), &manual);
        assert_eq!(engine.metrics().manual_overrides, 1);
    }

    #[tokio::test]
    async fn test_ignore_manual_recomputes() {
        let manual = ComponentsDistribution::manual(ComponentsMap::from([("Chat".to_string(), false)]));
        let mut engine = ComponentsEngine::new("i-1", "d-1");
        engine.set_instances(vec![
            Instance::new("i-1", "d-1", DeviceCapabilities::new()).with_distribution(manual)
        ]);
        engine.set_restrictions(parse_restrictions(&json!({"Chat": {}})));

        let facts = engine.run(true).await;

        assert_eq!(facts.halted_by, Some("resolve-automatic"));
        assert_eq!(engine.current_components_distribution()["Chat"], true);
    }

    #[tokio::test]
    async fn test_missing_local_instance_keeps_distribution() {
        let mut engine = ComponentsEngine::new("i-1", "d-1");
        let previous = ComponentsDistribution::automatic(ComponentsMap::from([("Chat".to_string(), true)]));
        engine.set_current_distribution(previous.clone());
        engine.set_restrictions(parse_restrictions(&json!({"Chat": {"camera": true}})));

        engine.run(false).await;
        engine.run(false).await;

        assert_eq!(engine.current_distribution(), &previous);
        assert_eq!(engine.metrics().previous_kept, 2);
    }

    #[tokio::test]
    async fn test_size_threshold_across_two_devices() {
        let restrictions = parse_restrictions(&json!({
            "Keyboard": {"size": {"value": [100, 200], "operator": "<="}}
        }));
        let proxemics = Proxemics::from([
            ("phone".to_string(), caps(json!({"size": [70, 150]}))),
            ("tablet".to_string(), caps(json!({"size": [200, 300]}))),
        ]);
        let instances = vec![
            Instance::new("i-phone", "phone", DeviceCapabilities::new()),
            Instance::new("i-tablet", "tablet", DeviceCapabilities::new()),
        ];

        let mut visible = Vec::new();
        for (instance, device) in [("i-phone", "phone"), ("i-tablet", "tablet")] {
            let mut engine = ComponentsEngine::new(instance, device);
            engine.set_restrictions(restrictions.clone());
            engine.set_proxemics(proxemics.clone());
            engine.set_instances(instances.clone());
            engine.run(false).await;
            visible.push(engine.current_components_distribution()["Keyboard"]);
        }

        assert_eq!(visible, vec![true, false]);
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let mut engine = single_device_engine();
        engine.set_restrictions(parse_restrictions(&json!({"Player": {"orientation": "landscape"}})));

        let first = engine.evaluate(false).distribution();
        let second = engine.evaluate(false).distribution();

        assert_eq!(first, second);
        assert_eq!(engine.metrics().runs, 2);
        assert!(engine.metrics().expansion_cache.hits >= 1);
    }

    #[test]
    fn test_uncached_config() {
        let mut engine = ComponentsEngine::with_config("i-1", "d-1", EngineConfig::uncached());
        engine.set_instances(vec![Instance::new("i-1", "d-1", DeviceCapabilities::new())]);
        engine.set_restrictions(parse_restrictions(&json!({"Player": {}})));

        engine.evaluate(false);
        engine.evaluate(false);

        let metrics = engine.metrics();
        assert_eq!(metrics.expansion_cache.hits, 0);
        assert_eq!(metrics.match_cache.hits, 0);
    }

    #[test]
    fn test_chain_exhaustion_counted() {
        let mut engine = ComponentsEngine::new("i-1", "d-1").with_chain(RuleChain::with_rules(vec![]));

        let facts = engine.evaluate(false);

        assert_eq!(facts.halted_by, None);
        let metrics = engine.metrics();
        assert_eq!(metrics.chain_exhausted, 1);
        assert_eq!(metrics.previous_kept, 1);
    }
}
