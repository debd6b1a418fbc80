//! Capability expansion
//!
//! Fills in display fields that can be derived from the ones a device
//! actually advertises. Expansion only ever adds missing fields, and each
//! derivation fills exactly one of them, so the fixpoint loop terminates.
//!
//! # Derivations
//!
//! 1. orientation defaults to `"landscape"`
//! 2. density → ratio = max(1, density / 150)
//! 3. ratio → density = 96 when ratio == 1, otherwise ratio * 150
//! 4. resolution + size → density = diag(resolution) / (diag(size) / 25.4)
//! 5. density + resolution → size, keeping the resolution's aspect ratio
//! 6. resolution + ratio → virtual resolution = resolution / ratio

use serde_json::{Map, Number, Value};

use super::types::{
    DeviceCapabilities, ORIENTATION, PIXEL_DENSITY, PIXEL_RATIO, RESOLUTION, SIZE,
    VIRTUAL_RESOLUTION,
};
use crate::cache::{CacheStats, MemoCache};
use crate::observability::{log_event_with_fields, Event};

const MM_PER_INCH: f64 = 25.4;
const BASELINE_DENSITY: f64 = 96.0;
const DENSITY_PER_RATIO: f64 = 150.0;
const DEFAULT_ORIENTATION: &str = "landscape";

type Record = Map<String, Value>;
type Derivation = fn(&mut Record) -> bool;

const DERIVATIONS: [Derivation; 6] = [
    default_orientation,
    ratio_from_density,
    density_from_ratio,
    density_from_geometry,
    size_from_density,
    virtual_resolution_from_ratio,
];

/// Expands device descriptors, memoized per (device id, raw descriptor).
#[derive(Debug)]
pub struct CapabilityExpander {
    display_capability: String,
    cache: MemoCache<(String, String), DeviceCapabilities>,
}

impl CapabilityExpander {
    /// Create an expander with an unbounded cache
    pub fn new(display_capability: impl Into<String>) -> Self {
        Self::with_cache(display_capability, MemoCache::new(0))
    }

    /// Create an expander with an explicit cache
    pub fn with_cache(
        display_capability: impl Into<String>,
        cache: MemoCache<(String, String), DeviceCapabilities>,
    ) -> Self {
        Self {
            display_capability: display_capability.into(),
            cache,
        }
    }

    /// The capability type whose variants are display records
    pub fn display_capability(&self) -> &str {
        &self.display_capability
    }

    /// Expand a raw descriptor.
    ///
    /// Deterministic: the same device id and descriptor always yield the
    /// same result, served from the cache after the first call.
    pub fn expand(&mut self, device_uuid: &str, raw: &DeviceCapabilities) -> DeviceCapabilities {
        let key = (device_uuid.to_string(), raw.fingerprint());
        let display_capability = &self.display_capability;
        self.cache.get_or_insert_with(key, || {
            let expanded = expand_capabilities(raw, display_capability);
            log_event_with_fields(
                Event::CapabilitiesExpanded,
                &[
                    ("changed", if expanded == *raw { "false" } else { "true" }),
                    ("device_uuid", device_uuid),
                ],
            );
            expanded
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Expand a descriptor without caching.
///
/// The top-level record is expanded when it carries display fields; every
/// object variant under `display_capability` is expanded independently.
pub fn expand_capabilities(raw: &DeviceCapabilities, display_capability: &str) -> DeviceCapabilities {
    let mut expanded = raw.clone();
    let top_level_is_display = expanded.is_display_record();
    let map = expanded.as_map_mut();

    if top_level_is_display {
        expand_record(map);
    }

    match map.get_mut(display_capability) {
        Some(Value::Array(variants)) => {
            for variant in variants.iter_mut() {
                if let Value::Object(record) = variant {
                    expand_record(record);
                }
            }
        }
        Some(Value::Object(record)) => expand_record(record),
        _ => {}
    }

    expanded
}

/// Apply derivations until none fills a field
fn expand_record(record: &mut Record) {
    while DERIVATIONS.iter().any(|derive| derive(record)) {}
}

fn default_orientation(record: &mut Record) -> bool {
    if record.contains_key(ORIENTATION) {
        return false;
    }
    record.insert(
        ORIENTATION.to_string(),
        Value::String(DEFAULT_ORIENTATION.to_string()),
    );
    true
}

fn ratio_from_density(record: &mut Record) -> bool {
    if record.contains_key(PIXEL_RATIO) {
        return false;
    }
    match number(record, PIXEL_DENSITY) {
        Some(density) => put_number(record, PIXEL_RATIO, (density / DENSITY_PER_RATIO).max(1.0)),
        None => false,
    }
}

fn density_from_ratio(record: &mut Record) -> bool {
    if record.contains_key(PIXEL_DENSITY) {
        return false;
    }
    match number(record, PIXEL_RATIO) {
        Some(ratio) if (ratio - 1.0).abs() < f64::EPSILON => {
            put_number(record, PIXEL_DENSITY, BASELINE_DENSITY)
        }
        Some(ratio) => put_number(record, PIXEL_DENSITY, ratio * DENSITY_PER_RATIO),
        None => false,
    }
}

fn density_from_geometry(record: &mut Record) -> bool {
    if record.contains_key(PIXEL_DENSITY) || record.contains_key(PIXEL_RATIO) {
        return false;
    }
    let (resolution, size) = match (pair(record, RESOLUTION), pair(record, SIZE)) {
        (Some(resolution), Some(size)) => (resolution, size),
        _ => return false,
    };
    let diagonal_inches = diagonal(size) / MM_PER_INCH;
    if diagonal_inches <= 0.0 {
        return false;
    }
    put_number(record, PIXEL_DENSITY, diagonal(resolution) / diagonal_inches)
}

fn size_from_density(record: &mut Record) -> bool {
    if record.contains_key(SIZE) {
        return false;
    }
    let (density, resolution) = match (number(record, PIXEL_DENSITY), pair(record, RESOLUTION)) {
        (Some(density), Some(resolution)) if density > 0.0 => (density, resolution),
        _ => return false,
    };
    let diagonal_px = diagonal(resolution);
    if diagonal_px <= 0.0 {
        return false;
    }
    let diagonal_mm = diagonal_px / density * MM_PER_INCH;
    put_pair(
        record,
        SIZE,
        (
            diagonal_mm * resolution.0 / diagonal_px,
            diagonal_mm * resolution.1 / diagonal_px,
        ),
    )
}

fn virtual_resolution_from_ratio(record: &mut Record) -> bool {
    if record.contains_key(VIRTUAL_RESOLUTION) {
        return false;
    }
    match (pair(record, RESOLUTION), number(record, PIXEL_RATIO)) {
        (Some(resolution), Some(ratio)) if ratio > 0.0 => put_pair(
            record,
            VIRTUAL_RESOLUTION,
            (resolution.0 / ratio, resolution.1 / ratio),
        ),
        _ => false,
    }
}

fn diagonal((width, height): (f64, f64)) -> f64 {
    width.hypot(height)
}

fn number(record: &Record, key: &str) -> Option<f64> {
    record
        .get(key)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
}

fn pair(record: &Record, key: &str) -> Option<(f64, f64)> {
    match record.get(key) {
        Some(Value::Array(items)) if items.len() >= 2 => {
            match (items[0].as_f64(), items[1].as_f64()) {
                (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((a, b)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn to_number(value: f64) -> Option<Value> {
    Number::from_f64(value).map(Value::Number)
}

fn put_number(record: &mut Record, key: &str, value: f64) -> bool {
    match to_number(value) {
        Some(number) => {
            record.insert(key.to_string(), number);
            true
        }
        None => false,
    }
}

fn put_pair(record: &mut Record, key: &str, (a, b): (f64, f64)) -> bool {
    match (to_number(a), to_number(b)) {
        (Some(a), Some(b)) => {
            record.insert(key.to_string(), Value::Array(vec![a, b]));
            true
        }
        _ => false,
    }
}
