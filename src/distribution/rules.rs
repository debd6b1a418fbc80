//! Rule chain
//!
//! Rules run strictly from highest to lowest priority over one [`Facts`]
//! record. A rule whose guard holds either hands the facts on
//! ([`ControlSignal::Continue`]) or produces the final result
//! ([`ControlSignal::Halt`]).
//!
//! | Priority | Rule | Terminal |
//! |---|---|---|
//! | 4 | seed defaults | no |
//! | 3 | manual override | yes |
//! | 2 | no local instance | yes |
//! | 1 | build capability map | no |
//! | 0 | resolve automatic distribution | yes |
//!
//! With the standard rules exactly one terminal rule fires per execution:
//! rule 2 covers a missing local instance, and otherwise rule 1 always
//! records local capabilities, which is rule 0's guard.

use std::collections::BTreeMap;

use super::facts::{ComponentsConfig, Facts};
use crate::capabilities::{CapabilitiesMap, CapabilityExpander};
use crate::observability::{log_event_with_fields, Event};
use crate::restrictions::ConditionMatcher;

/// Outcome of applying a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Hand the facts to the next rule
    Continue,
    /// The facts hold the final result
    Halt,
}

/// Services available to rules
pub struct RuleContext<'a> {
    pub expander: &'a mut CapabilityExpander,
    pub matcher: &'a mut ConditionMatcher,
}

/// A guarded step of the chain
pub trait Rule: Send + Sync {
    /// Stable identifier used in logs and [`Facts::fired_rules`]
    fn name(&self) -> &'static str;

    /// Higher runs first
    fn priority(&self) -> u8;

    /// Whether the rule applies to these facts
    fn condition(&self, facts: &Facts) -> bool;

    /// Transform the facts
    fn apply(&self, facts: Facts, ctx: &mut RuleContext<'_>) -> (Facts, ControlSignal);
}

/// Seed tri-state visibility from each restriction's default hint.
pub struct SeedDefaults;

impl Rule for SeedDefaults {
    fn name(&self) -> &'static str {
        "seed-defaults"
    }

    fn priority(&self) -> u8 {
        4
    }

    fn condition(&self, facts: &Facts) -> bool {
        facts.components_config.is_none()
    }

    fn apply(&self, mut facts: Facts, _ctx: &mut RuleContext<'_>) -> (Facts, ControlSignal) {
        let config: ComponentsConfig = facts
            .restrictions
            .iter()
            .map(|(component, restriction)| (component.clone(), restriction.show_by_default()))
            .collect();
        log_event_with_fields(
            Event::DefaultsSeeded,
            &[
                ("components", &config.len().to_string()),
                ("run_id", &facts.run_id.to_string()),
            ],
        );
        facts.components_config = Some(config);
        (facts, ControlSignal::Continue)
    }
}

/// Respect a manual distribution on the local instance.
pub struct ManualOverride;

impl Rule for ManualOverride {
    fn name(&self) -> &'static str {
        "manual-override"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn condition(&self, facts: &Facts) -> bool {
        !facts.ignore_manual
            && facts
                .local_instance
                .as_ref()
                .and_then(|instance| instance.manual_distribution())
                .is_some()
    }

    fn apply(&self, mut facts: Facts, _ctx: &mut RuleContext<'_>) -> (Facts, ControlSignal) {
        if let Some(manual) = facts
            .local_instance
            .as_ref()
            .and_then(|instance| instance.manual_distribution())
            .cloned()
        {
            facts.settle(&manual);
            log_event_with_fields(
                Event::ManualOverrideAdopted,
                &[
                    ("components", &manual.components.len().to_string()),
                    ("instance_uuid", &facts.local_instance_uuid),
                    ("run_id", &facts.run_id.to_string()),
                ],
            );
        }
        (facts, ControlSignal::Halt)
    }
}

/// Without an active local instance, keep what was decided last time.
pub struct NoLocalInstance;

impl Rule for NoLocalInstance {
    fn name(&self) -> &'static str {
        "no-local-instance"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn condition(&self, facts: &Facts) -> bool {
        facts.local_instance.is_none()
    }

    fn apply(&self, facts: Facts, _ctx: &mut RuleContext<'_>) -> (Facts, ControlSignal) {
        (keep_previous(facts), ControlSignal::Halt)
    }
}

/// Expand capabilities of every active device.
pub struct BuildCapabilityMap;

impl Rule for BuildCapabilityMap {
    fn name(&self) -> &'static str {
        "build-capability-map"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn condition(&self, facts: &Facts) -> bool {
        facts.local_instance.is_some() && facts.capabilities.is_none()
    }

    fn apply(&self, mut facts: Facts, ctx: &mut RuleContext<'_>) -> (Facts, ControlSignal) {
        let active_devices = facts.active_devices();
        let mut capabilities: CapabilitiesMap = facts
            .proxemics
            .iter()
            .filter(|(device_uuid, _)| active_devices.contains(device_uuid.as_str()))
            .map(|(device_uuid, raw)| (device_uuid.clone(), ctx.expander.expand(device_uuid, raw)))
            .collect();

        // Not advertised in proxemics: fall back to what the local instance declares
        if !capabilities.contains_key(&facts.local_device_uuid) {
            let declared = facts
                .local_instance
                .as_ref()
                .map(|instance| instance.device.capabilities.clone())
                .unwrap_or_default();
            let expanded = ctx.expander.expand(&facts.local_device_uuid, &declared);
            capabilities = BTreeMap::from([(facts.local_device_uuid.clone(), expanded)]);
        }

        log_event_with_fields(
            Event::CapabilityMapBuilt,
            &[
                ("devices", &capabilities.len().to_string()),
                ("run_id", &facts.run_id.to_string()),
            ],
        );
        facts.local_device_capabilities = capabilities.get(&facts.local_device_uuid).cloned();
        facts.capabilities = Some(capabilities);
        (facts, ControlSignal::Continue)
    }
}

/// Resolve visibility by matching restrictions against local capabilities.
///
/// Undetermined components are always matched. When more than one device has
/// an active instance every component is matched, pinned defaults included.
pub struct ResolveAutomaticDistribution;

impl Rule for ResolveAutomaticDistribution {
    fn name(&self) -> &'static str {
        "resolve-automatic"
    }

    fn priority(&self) -> u8 {
        0
    }

    fn condition(&self, facts: &Facts) -> bool {
        facts.local_device_capabilities.is_some()
    }

    fn apply(&self, mut facts: Facts, ctx: &mut RuleContext<'_>) -> (Facts, ControlSignal) {
        let multi_device = facts.active_devices().len() > 1;
        let mut config = facts.components_config.take().unwrap_or_default();
        let no_devices = CapabilitiesMap::new();
        let all = facts.capabilities.as_ref().unwrap_or(&no_devices);

        if let Some(local) = facts.local_device_capabilities.as_ref() {
            for (component, visibility) in config.iter_mut() {
                if visibility.is_some() && !multi_device {
                    continue;
                }
                let resolved = match facts.restrictions.get(component) {
                    Some(restriction) => ctx.matcher.matches(
                        component,
                        restriction,
                        &facts.local_device_uuid,
                        local,
                        all,
                        true,
                    ),
                    None => visibility.unwrap_or(true),
                };
                *visibility = Some(resolved);
            }
        }

        let shown = config.values().filter(|v| **v == Some(true)).count();
        log_event_with_fields(
            Event::DistributionResolved,
            &[
                ("components", &config.len().to_string()),
                ("multi_device", if multi_device { "true" } else { "false" }),
                ("run_id", &facts.run_id.to_string()),
                ("shown", &shown.to_string()),
            ],
        );
        facts.components_config = Some(config);
        facts.auto = Some(true);
        (facts, ControlSignal::Halt)
    }
}

/// Settle on the previous distribution unchanged
fn keep_previous(mut facts: Facts) -> Facts {
    let previous = facts.previous_distribution.clone();
    facts.settle(&previous);
    log_event_with_fields(
        Event::PreviousDistributionKept,
        &[
            ("components", &previous.components.len().to_string()),
            ("run_id", &facts.run_id.to_string()),
        ],
    );
    facts
}

/// Priority-ordered rules
pub struct RuleChain {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleChain {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleChain {
    /// The standard five-rule chain
    pub fn new() -> Self {
        Self::with_rules(vec![
            Box::new(SeedDefaults),
            Box::new(ManualOverride),
            Box::new(NoLocalInstance),
            Box::new(BuildCapabilityMap),
            Box::new(ResolveAutomaticDistribution),
        ])
    }

    /// A chain of custom rules, ordered by descending priority.
    /// Rules of equal priority keep their given order.
    pub fn with_rules(mut rules: Vec<Box<dyn Rule>>) -> Self {
        rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Run the chain to completion.
    ///
    /// If no rule halts, the previous distribution is kept.
    pub fn execute(&self, mut facts: Facts, ctx: &mut RuleContext<'_>) -> Facts {
        for rule in &self.rules {
            if !rule.condition(&facts) {
                continue;
            }
            facts.fired_rules.push(rule.name());
            log_event_with_fields(
                Event::RuleFired,
                &[
                    ("priority", &rule.priority().to_string()),
                    ("rule", rule.name()),
                    ("run_id", &facts.run_id.to_string()),
                ],
            );

            let (next, signal) = rule.apply(facts, ctx);
            facts = next;
            if signal == ControlSignal::Halt {
                facts.halted_by = Some(rule.name());
                return facts;
            }
        }

        log_event_with_fields(
            Event::RuleChainExhausted,
            &[("run_id", &facts.run_id.to_string())],
        );
        keep_previous(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DeviceCapabilities;
    use crate::distribution::types::{ComponentsDistribution, ComponentsMap, Instance};
    use crate::restrictions::parse_restrictions;
    use serde_json::json;

    fn run(chain: &RuleChain, facts: Facts) -> Facts {
        let mut expander = CapabilityExpander::new("display");
        let mut matcher = ConditionMatcher::new();
        let mut ctx = RuleContext {
            expander: &mut expander,
            matcher: &mut matcher,
        };
        chain.execute(facts, &mut ctx)
    }

    fn local_instance() -> Instance {
        Instance::new("i-1", "d-1", DeviceCapabilities::from(json!({"resolution": [1920, 1080]})))
    }

    #[test]
    fn test_chain_is_priority_ordered() {
        let chain = RuleChain::new();
        assert_eq!(
            chain.names(),
            vec![
                "seed-defaults",
                "manual-override",
                "no-local-instance",
                "build-capability-map",
                "resolve-automatic",
            ]
        );
    }

    #[test]
    fn test_automatic_path_fires_three_rules() {
        let facts = Facts::new("i-1", "d-1", false)
            .with_instances(vec![local_instance()])
            .with_restrictions(parse_restrictions(&json!({"Player": {"resolution": [1920, 1080]}})));

        let facts = run(&RuleChain::new(), facts);

        assert_eq!(
            facts.fired_rules,
            vec!["seed-defaults", "build-capability-map", "resolve-automatic"]
        );
        assert_eq!(facts.halted_by, Some("resolve-automatic"));
        assert_eq!(facts.distribution().components["Player"], true);
    }

    #[test]
    fn test_no_local_instance_keeps_previous() {
        let previous = ComponentsDistribution::automatic(ComponentsMap::from([("Chat".to_string(), true)]));
        let facts = Facts::new("i-1", "d-1", false)
            .with_restrictions(parse_restrictions(&json!({"Chat": {"camera": true}})))
            .with_previous_distribution(previous.clone());

        let facts = run(&RuleChain::new(), facts);

        assert_eq!(facts.halted_by, Some("no-local-instance"));
        assert_eq!(facts.distribution(), previous);
        assert!(facts.capabilities.is_none());
    }

    #[test]
    fn test_local_capabilities_fall_back_to_declared() {
        let facts = Facts::new("i-1", "d-1", false)
            .with_instances(vec![local_instance()])
            .with_proxemics(BTreeMap::from([(
                "someone-else".to_string(),
                DeviceCapabilities::from(json!({"pixelRatio": 2})),
            )]));

        let facts = run(&RuleChain::new(), facts);

        let capabilities = facts.capabilities.unwrap();
        assert_eq!(capabilities.len(), 1);
        assert!(capabilities["d-1"].get("resolution").is_some());
        assert!(facts.local_device_capabilities.is_some());
    }

    #[test]
    fn test_proxemics_of_inactive_devices_skipped() {
        let idle = Instance::new("i-2", "d-2", DeviceCapabilities::new()).with_active(false);
        let facts = Facts::new("i-1", "d-1", false)
            .with_instances(vec![local_instance(), idle])
            .with_proxemics(BTreeMap::from([
                ("d-1".to_string(), DeviceCapabilities::from(json!({"pixelRatio": 1}))),
                ("d-2".to_string(), DeviceCapabilities::from(json!({"pixelRatio": 2}))),
            ]));

        let facts = run(&RuleChain::new(), facts);

        let capabilities = facts.capabilities.unwrap();
        assert!(capabilities.contains_key("d-1"));
        assert!(!capabilities.contains_key("d-2"));
    }

    #[test]
    fn test_exhausted_chain_keeps_previous() {
        let previous = ComponentsDistribution::automatic(ComponentsMap::from([("Chat".to_string(), false)]));
        let chain = RuleChain::with_rules(vec![Box::new(SeedDefaults)]);

        let facts = run(
            &chain,
            Facts::new("i-1", "d-1", false).with_previous_distribution(previous.clone()),
        );

        assert_eq!(facts.halted_by, None);
        assert_eq!(facts.distribution(), previous);
    }
}
