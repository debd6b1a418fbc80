//! proxemo - proxemic distribution of UI components across co-present devices
//!
//! Given administrator restrictions, the capabilities of nearby devices and
//! the running instances, decides which components the local instance shows.

pub mod cache;
pub mod capabilities;
pub mod cli;
pub mod distribution;
pub mod observability;
pub mod restrictions;
