//! Per-component restrictions
//!
//! ```json
//! {
//!   "Video Call": {
//!     "showByDefault": true,
//!     "enforce": false,
//!     "display": {"resolution": {"value": [1280, 720], "operator": ">="}},
//!     "camera": true
//!   }
//! }
//! ```
//!
//! Every key other than `showByDefault` and `enforce` is a capability type
//! mapped to a [`Condition`]. Malformed restrictions load as permissive ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::{Condition, ENFORCE_KEY};

/// Key of the tri-state default visibility hint
pub const SHOW_BY_DEFAULT_KEY: &str = "showByDefault";

/// Restriction for one UI component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Restriction {
    show_by_default: Option<bool>,
    enforce: Option<bool>,
    conditions: BTreeMap<String, Condition>,
    source: Value,
    fingerprint: String,
}

impl Restriction {
    /// Parse a restriction. Anything that is not an object yields an empty,
    /// always-matching restriction.
    pub fn parse(source: Value) -> Self {
        let (show_by_default, enforce, conditions) = match &source {
            Value::Object(map) => (
                map.get(SHOW_BY_DEFAULT_KEY).and_then(Value::as_bool),
                map.get(ENFORCE_KEY).and_then(Value::as_bool),
                map.iter()
                    .filter(|(key, _)| {
                        key.as_str() != SHOW_BY_DEFAULT_KEY && key.as_str() != ENFORCE_KEY
                    })
                    .map(|(key, value)| (key.clone(), Condition::parse(value)))
                    .collect(),
            ),
            _ => (None, None, BTreeMap::new()),
        };
        let fingerprint = serde_json::to_string(&source).unwrap_or_default();

        Self {
            show_by_default,
            enforce,
            conditions,
            source,
            fingerprint,
        }
    }

    /// Default visibility before automatic resolution (`None` = undetermined)
    pub fn show_by_default(&self) -> Option<bool> {
        self.show_by_default
    }

    /// Restriction-wide fallback flag, inherited by conditions without their own
    pub fn enforce(&self) -> Option<bool> {
        self.enforce
    }

    /// Capability type → condition, hint excluded
    pub fn conditions(&self) -> &BTreeMap<String, Condition> {
        &self.conditions
    }

    /// Whether the restriction constrains nothing
    pub fn is_unconstrained(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The JSON this restriction was loaded from
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Canonical JSON of the source, used as a structural cache key
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl From<Value> for Restriction {
    fn from(value: Value) -> Self {
        Self::parse(value)
    }
}

impl From<Restriction> for Value {
    fn from(restriction: Restriction) -> Self {
        restriction.source
    }
}

/// Restrictions by component name
pub type Restrictions = BTreeMap<String, Restriction>;

/// Parse a `{component: restriction}` JSON object.
///
/// A non-object document yields no restrictions.
pub fn parse_restrictions(value: &Value) -> Restrictions {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(component, restriction)| (component.clone(), Restriction::parse(restriction.clone())))
            .collect(),
        _ => Restrictions::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hint_and_conditions() {
        let r = Restriction::parse(json!({
            "showByDefault": false,
            "enforce": false,
            "display": {"orientation": "portrait"}
        }));

        assert_eq!(r.show_by_default(), Some(false));
        assert_eq!(r.enforce(), Some(false));
        assert_eq!(r.conditions().len(), 1);
        assert!(r.conditions().contains_key("display"));
    }

    #[test]
    fn test_non_boolean_hint_is_unset() {
        let r = Restriction::parse(json!({"showByDefault": "yes"}));

        assert_eq!(r.show_by_default(), None);
        assert!(r.is_unconstrained());
    }

    #[test]
    fn test_malformed_restriction_is_unconstrained() {
        let r = Restriction::parse(json!(42));

        assert_eq!(r.show_by_default(), None);
        assert!(r.is_unconstrained());
    }

    #[test]
    fn test_round_trips_source() {
        let source = json!({"showByDefault": true, "camera": true});
        let r: Restriction = serde_json::from_value(source.clone()).unwrap();

        assert_eq!(serde_json::to_value(&r).unwrap(), source);
    }

    #[test]
    fn test_parse_restrictions_document() {
        let restrictions = parse_restrictions(&json!({
            "Player": {"display": true},
            "Controls": {"input": "touchscreen"}
        }));

        assert_eq!(restrictions.len(), 2);
        assert!(parse_restrictions(&json!([])).is_empty());
    }
}
