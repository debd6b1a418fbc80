//! Distribution data model
//!
//! Field names follow the camelCase JSON used by the synchronization layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capabilities::DeviceCapabilities;

/// Component name → visible
pub type ComponentsMap = BTreeMap<String, bool>;

/// Component visibility decided for one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsDistribution {
    /// `false` marks a user override that must be respected
    #[serde(default = "default_auto")]
    pub auto: bool,
    #[serde(default)]
    pub components: ComponentsMap,
}

fn default_auto() -> bool {
    true
}

impl Default for ComponentsDistribution {
    fn default() -> Self {
        Self::automatic(ComponentsMap::new())
    }
}

impl ComponentsDistribution {
    /// A distribution computed by the engine
    pub fn automatic(components: ComponentsMap) -> Self {
        Self {
            auto: true,
            components,
        }
    }

    /// A distribution chosen by the user
    pub fn manual(components: ComponentsMap) -> Self {
        Self {
            auto: false,
            components,
        }
    }

    /// Whether this is a user override carrying at least one component
    pub fn is_manual_override(&self) -> bool {
        !self.auto && !self.components.is_empty()
    }
}

/// Device an instance runs on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_uuid: String,
    /// Capabilities as declared by the device itself
    #[serde(default)]
    pub capabilities: DeviceCapabilities,
}

/// A running application on a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_uuid: String,
    pub device: Device,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub components_distribution: Option<ComponentsDistribution>,
}

impl Instance {
    /// Create an active instance with no distribution
    pub fn new(
        instance_uuid: impl Into<String>,
        device_uuid: impl Into<String>,
        capabilities: DeviceCapabilities,
    ) -> Self {
        Self {
            instance_uuid: instance_uuid.into(),
            device: Device {
                device_uuid: device_uuid.into(),
                capabilities,
            },
            active: true,
            components_distribution: None,
        }
    }

    /// Set the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Attach a distribution
    pub fn with_distribution(mut self, distribution: ComponentsDistribution) -> Self {
        self.components_distribution = Some(distribution);
        self
    }

    pub fn device_uuid(&self) -> &str {
        &self.device.device_uuid
    }

    /// The manual distribution, when the instance carries a non-empty one
    pub fn manual_distribution(&self) -> Option<&ComponentsDistribution> {
        self.components_distribution
            .as_ref()
            .filter(|distribution| distribution.is_manual_override())
    }
}
