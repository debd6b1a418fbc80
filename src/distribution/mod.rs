//! Component distribution subsystem
//!
//! Decides which UI components the local instance shows, given the
//! restrictions, the co-present devices and the running instances.
//!
//! Flow of one run:
//!
//! 1. [`ComponentsEngine`] snapshots its state into fresh [`Facts`]
//! 2. [`RuleChain`] applies rules by descending priority until one halts
//! 3. The engine stores the settled [`ComponentsDistribution`] and returns the facts
//!
//! The engine never fails on missing or partial input. Errors only exist at
//! the edges: [`ConfigError`] when loading configuration and [`HandleError`]
//! when the task behind an [`EngineHandle`] is gone.

mod config;
mod engine;
mod errors;
mod facts;
mod handle;
mod rules;
mod types;

pub use config::EngineConfig;
pub use engine::ComponentsEngine;
pub use errors::{ConfigError, ConfigResult, HandleError, HandleResult};
pub use facts::{ComponentsConfig, Facts};
pub use handle::EngineHandle;
pub use rules::{
    BuildCapabilityMap, ControlSignal, ManualOverride, NoLocalInstance,
    ResolveAutomaticDistribution, Rule, RuleChain, RuleContext, SeedDefaults,
};
pub use types::{ComponentsDistribution, ComponentsMap, Device, Instance};
