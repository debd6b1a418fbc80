//! Device capability descriptors
//!
//! A descriptor is a JSON object from capability type to a value or to an
//! array of alternative variants (e.g. one record per screen).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Screen orientation (`"landscape"` / `"portrait"`)
pub const ORIENTATION: &str = "orientation";
/// Pixels per inch
pub const PIXEL_DENSITY: &str = "pixelDensity";
/// Device pixels per CSS pixel
pub const PIXEL_RATIO: &str = "pixelRatio";
/// `[width, height]` in device pixels
pub const RESOLUTION: &str = "resolution";
/// `[width, height]` in millimetres
pub const SIZE: &str = "size";
/// `[width, height]` in CSS pixels
pub const VIRTUAL_RESOLUTION: &str = "virtualResolution";

/// Fields that make a record a display record.
pub const DISPLAY_FIELDS: [&str; 6] = [
    ORIENTATION,
    PIXEL_DENSITY,
    PIXEL_RATIO,
    RESOLUTION,
    SIZE,
    VIRTUAL_RESOLUTION,
];

/// Capabilities advertised by one device.
///
/// Any JSON that is not an object deserializes to an empty descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct DeviceCapabilities(Map<String, Value>);

impl DeviceCapabilities {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value advertised for a capability type
    pub fn get(&self, capability: &str) -> Option<&Value> {
        self.0.get(capability)
    }

    /// Check whether a capability type is advertised
    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains_key(capability)
    }

    /// Set a capability value, returning the previous one
    pub fn insert(&mut self, capability: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(capability.into(), value)
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, capability: impl Into<String>, value: Value) -> Self {
        self.insert(capability, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate capability types in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Whether the top-level record carries any display field
    pub fn is_display_record(&self) -> bool {
        DISPLAY_FIELDS.iter().any(|field| self.0.contains_key(*field))
    }

    /// Canonical JSON form, used as a structural cache key.
    ///
    /// Object keys serialize in sorted order, so equal descriptors always
    /// produce equal fingerprints.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for DeviceCapabilities {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for DeviceCapabilities {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

impl From<DeviceCapabilities> for Value {
    fn from(capabilities: DeviceCapabilities) -> Self {
        Value::Object(capabilities.0)
    }
}

/// Raw descriptors of all co-present devices, by device id
pub type Proxemics = BTreeMap<String, DeviceCapabilities>;

/// Expanded descriptors of all active devices, by device id
pub type CapabilitiesMap = BTreeMap<String, DeviceCapabilities>;

/// Canonical JSON form of a whole capability map
pub fn fingerprint_all(capabilities: &CapabilitiesMap) -> String {
    serde_json::to_string(capabilities).unwrap_or_default()
}
