//! Per-run working memory
//!
//! A [`Facts`] record is built fresh for every `run()`, threaded by value
//! through the rule chain, and handed back to the caller when the chain halts.
//! It is never shared between runs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::types::{ComponentsDistribution, Instance};
use crate::capabilities::{CapabilitiesMap, DeviceCapabilities, Proxemics};
use crate::restrictions::Restrictions;

/// Component name → tri-state visibility (`None` = undetermined)
pub type ComponentsConfig = BTreeMap<String, Option<bool>>;

/// Working memory of one rule-chain execution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facts {
    /// Identifies this run in logs
    pub run_id: Uuid,
    pub evaluated_at: DateTime<Utc>,

    // Inputs
    pub local_instance_uuid: String,
    pub local_device_uuid: String,
    pub ignore_manual: bool,
    /// Active instances only
    pub instances: Vec<Instance>,
    pub proxemics: Proxemics,
    pub restrictions: Restrictions,
    pub previous_distribution: ComponentsDistribution,

    // Computed
    /// The local instance, if it is among the active ones
    pub local_instance: Option<Instance>,
    pub components_config: Option<ComponentsConfig>,
    pub auto: Option<bool>,
    pub capabilities: Option<CapabilitiesMap>,
    pub local_device_capabilities: Option<DeviceCapabilities>,

    // Diagnostics
    pub fired_rules: Vec<&'static str>,
    pub halted_by: Option<&'static str>,
}

impl Facts {
    /// Create facts for the given local identity
    pub fn new(
        local_instance_uuid: impl Into<String>,
        local_device_uuid: impl Into<String>,
        ignore_manual: bool,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            evaluated_at: Utc::now(),
            local_instance_uuid: local_instance_uuid.into(),
            local_device_uuid: local_device_uuid.into(),
            ignore_manual,
            instances: Vec::new(),
            proxemics: Proxemics::new(),
            restrictions: Restrictions::new(),
            previous_distribution: ComponentsDistribution::default(),
            local_instance: None,
            components_config: None,
            auto: None,
            capabilities: None,
            local_device_capabilities: None,
            fired_rules: Vec::new(),
            halted_by: None,
        }
    }

    /// Keep the active instances and resolve the local one among them
    pub fn with_instances(mut self, instances: impl IntoIterator<Item = Instance>) -> Self {
        self.instances = instances.into_iter().filter(|i| i.active).collect();
        self.local_instance = self
            .instances
            .iter()
            .find(|i| i.instance_uuid == self.local_instance_uuid)
            .cloned();
        self
    }

    pub fn with_proxemics(mut self, proxemics: Proxemics) -> Self {
        self.proxemics = proxemics;
        self
    }

    pub fn with_restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_previous_distribution(mut self, distribution: ComponentsDistribution) -> Self {
        self.previous_distribution = distribution;
        self
    }

    /// Distinct devices with an active instance
    pub fn active_devices(&self) -> BTreeSet<&str> {
        self.instances.iter().map(Instance::device_uuid).collect()
    }

    /// Adopt a final components map
    pub(crate) fn settle(&mut self, distribution: &ComponentsDistribution) {
        self.components_config = Some(
            distribution
                .components
                .iter()
                .map(|(name, visible)| (name.clone(), Some(*visible)))
                .collect(),
        );
        self.auto = Some(distribution.auto);
    }

    /// The distribution these facts settled on.
    ///
    /// Components still undetermined are omitted.
    pub fn distribution(&self) -> ComponentsDistribution {
        let components = self
            .components_config
            .iter()
            .flatten()
            .filter_map(|(name, visible)| visible.map(|v| (name.clone(), v)))
            .collect();
        ComponentsDistribution {
            auto: self.auto.unwrap_or(true),
            components,
        }
    }
}
