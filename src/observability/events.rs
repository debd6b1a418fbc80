//! Observable engine events
//!
//! Events are explicit and typed; each maps to a stable upper-snake name.

use std::fmt;

use super::logger::Severity;

/// Observable events in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Engine configuration loaded
    ConfigLoaded,
    /// Session state loaded from a file
    StateLoaded,

    // Engine runs
    /// A `run()` began
    RunBegin,
    /// A `run()` finished and the distribution was stored
    RunComplete,

    // Rule chain
    /// A rule's guard held and its consequence ran
    RuleFired,
    /// Tri-state defaults seeded from restrictions
    DefaultsSeeded,
    /// The local instance's manual distribution was adopted
    ManualOverrideAdopted,
    /// The previous distribution was kept
    PreviousDistributionKept,
    /// Expanded capabilities collected for active devices
    CapabilityMapBuilt,
    /// Components resolved automatically
    DistributionResolved,
    /// No terminal rule fired
    RuleChainExhausted,

    // Capabilities and matching
    /// A descriptor was expanded (cache miss)
    CapabilitiesExpanded,
    /// A restriction entry was forgiven by the fallback policy
    FallbackForgiven,

    // Handle
    /// The engine task stopped
    HandleStopped,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StateLoaded => "STATE_LOADED",

            Event::RunBegin => "ENGINE_RUN_BEGIN",
            Event::RunComplete => "ENGINE_RUN_COMPLETE",

            Event::RuleFired => "RULE_FIRED",
            Event::DefaultsSeeded => "DEFAULTS_SEEDED",
            Event::ManualOverrideAdopted => "MANUAL_OVERRIDE_ADOPTED",
            Event::PreviousDistributionKept => "PREVIOUS_DISTRIBUTION_KEPT",
            Event::CapabilityMapBuilt => "CAPABILITY_MAP_BUILT",
            Event::DistributionResolved => "DISTRIBUTION_RESOLVED",
            Event::RuleChainExhausted => "RULE_CHAIN_EXHAUSTED",

            Event::CapabilitiesExpanded => "CAPABILITIES_EXPANDED",
            Event::FallbackForgiven => "FALLBACK_FORGIVEN",

            Event::HandleStopped => "ENGINE_HANDLE_STOPPED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RuleFired
            | Event::DefaultsSeeded
            | Event::CapabilityMapBuilt
            | Event::CapabilitiesExpanded
            | Event::FallbackForgiven => Severity::Trace,
            Event::RuleChainExhausted => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
