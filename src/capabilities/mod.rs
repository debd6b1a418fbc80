//! Device capabilities
//!
//! Descriptors advertised by devices and the expansion that derives missing
//! display fields from the ones present.
//!
//! # Invariants
//!
//! - Expansion never overwrites a field that is present
//! - Expansion is idempotent: expanding an expanded descriptor is a no-op
//! - Pixel density and pixel ratio are mutually derivable after expansion

mod expander;
mod types;

pub use expander::{expand_capabilities, CapabilityExpander};
pub use types::{
    fingerprint_all, CapabilitiesMap, DeviceCapabilities, Proxemics, DISPLAY_FIELDS, ORIENTATION,
    PIXEL_DENSITY, PIXEL_RATIO, RESOLUTION, SIZE, VIRTUAL_RESOLUTION,
};
