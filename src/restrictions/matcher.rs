//! Condition matching
//!
//! Decides whether a device's expanded capabilities satisfy a component's
//! restriction. Matching is pure and memoized per engine.
//!
//! # Fallback
//!
//! An entry whose effective `enforce` is `false` is forgiven on the local
//! device when no other known device satisfies it either. The same applies
//! to an operator wrapper nested inside a list or a logical wrapper, except
//! under `NOT`, where forgiving would invert the outcome. The check on the
//! other devices runs non-strict, so it never recurses into another fallback.
//! Devices are visited in ascending id order; the outcome does not depend on
//! that order because the check is a universal quantification.
//!
//! Forgiven paths are cached with the result, so every call that relies on a
//! fallback is logged and counted, cache hit or not.

use serde_json::{Map, Value};

use super::condition::{values_equal, Combinator, Comparison, Condition, Operator};
use super::restriction::Restriction;
use crate::cache::{CacheStats, MemoCache};
use crate::capabilities::{fingerprint_all, CapabilitiesMap, DeviceCapabilities};
use crate::observability::{log_event_with_fields, Event};

/// Structural key of one `matches` call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    component: String,
    restriction: String,
    local_device_uuid: String,
    local_capabilities: String,
    all_capabilities: String,
    strict: bool,
}

/// Cached result of one `matches` call
#[derive(Debug, Clone)]
struct MatchOutcome {
    matched: bool,
    forgiven: Vec<String>,
}

/// Memoizing restriction matcher
#[derive(Debug)]
pub struct ConditionMatcher {
    cache: MemoCache<MatchKey, MatchOutcome>,
    forgiven: u64,
}

impl Default for ConditionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionMatcher {
    /// Create a matcher with an unbounded cache
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a matcher whose cache holds at most `max_entries` results
    /// (zero means unbounded)
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            cache: MemoCache::new(max_entries),
            forgiven: 0,
        }
    }

    /// Create a matcher that recomputes every call
    pub fn uncached() -> Self {
        Self {
            cache: MemoCache::disabled(),
            forgiven: 0,
        }
    }

    /// Check whether `local_capabilities` satisfy every entry of `restriction`.
    ///
    /// `all_capabilities` holds every known device, the local one included;
    /// it is consulted only by the fallback policy when `strict` is set.
    pub fn matches(
        &mut self,
        component: &str,
        restriction: &Restriction,
        local_device_uuid: &str,
        local_capabilities: &DeviceCapabilities,
        all_capabilities: &CapabilitiesMap,
        strict: bool,
    ) -> bool {
        let key = MatchKey {
            component: component.to_string(),
            restriction: restriction.fingerprint().to_string(),
            local_device_uuid: local_device_uuid.to_string(),
            local_capabilities: local_capabilities.fingerprint(),
            all_capabilities: fingerprint_all(all_capabilities),
            strict,
        };
        let outcome = match self.cache.get(&key) {
            Some(hit) => hit,
            None => {
                let mut evaluation = Evaluation::new(local_device_uuid, all_capabilities, strict);
                let matched = evaluation.restriction(restriction, local_capabilities);
                let outcome = MatchOutcome {
                    matched,
                    forgiven: evaluation.forgiven,
                };
                self.cache.insert(key, outcome.clone());
                outcome
            }
        };

        for path in &outcome.forgiven {
            log_event_with_fields(
                Event::FallbackForgiven,
                &[
                    ("component", component),
                    ("device_uuid", local_device_uuid),
                    ("path", path),
                ],
            );
        }
        self.forgiven += outcome.forgiven.len() as u64;
        outcome.matched
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of fallback forgivenesses so far, counted once per call
    pub fn forgiven_count(&self) -> u64 {
        self.forgiven
    }
}

/// State of one top-level match
struct Evaluation<'a> {
    local_device_uuid: &'a str,
    all_capabilities: &'a CapabilitiesMap,
    strict: bool,
    forgiven: Vec<String>,
}

impl<'a> Evaluation<'a> {
    fn new(local_device_uuid: &'a str, all_capabilities: &'a CapabilitiesMap, strict: bool) -> Self {
        Self {
            local_device_uuid,
            all_capabilities,
            strict,
            forgiven: Vec::new(),
        }
    }

    fn restriction(&mut self, restriction: &Restriction, local: &DeviceCapabilities) -> bool {
        restriction
            .conditions()
            .iter()
            .all(|(capability, condition)| {
                let enforce = condition.enforce().or(restriction.enforce());
                self.entry(
                    &[capability.as_str()],
                    condition,
                    candidates(local.get(capability)),
                    enforce,
                )
            })
    }

    /// Evaluate one keyed entry against the candidate values at `path`.
    fn entry(
        &mut self,
        path: &[&str],
        condition: &Condition,
        candidates: Vec<Option<&Value>>,
        enforce: Option<bool>,
    ) -> bool {
        let satisfied = candidates
            .into_iter()
            .any(|capability| self.evaluate(path, condition, capability, Combinator::And, enforce));
        if satisfied {
            return true;
        }

        if self.strict && enforce == Some(false) && self.unsatisfiable_elsewhere(path, condition, enforce) {
            self.forgive(path.join("."));
            return true;
        }
        false
    }

    /// Evaluate the `index`th element of a list or logical wrapper.
    ///
    /// A failing operator wrapper whose effective `enforce` is `false` gets
    /// the same fallback as a keyed entry, checked at the enclosing path.
    fn element(
        &mut self,
        path: &[&str],
        index: usize,
        item: &Condition,
        capability: Option<&Value>,
        combinator: Combinator,
        enforce: Option<bool>,
    ) -> bool {
        if self.evaluate(path, item, capability, combinator, enforce) {
            return true;
        }

        let enforce = match item {
            Condition::Operator { enforce: own, .. } => own.or(enforce),
            _ => return false,
        };
        if !self.strict || enforce != Some(false) || combinator == Combinator::Not {
            return false;
        }
        if self.unsatisfiable_elsewhere(path, item, enforce) {
            self.forgive(format!("{}[{}]", path.join("."), index));
            return true;
        }
        false
    }

    fn forgive(&mut self, label: String) {
        if !self.forgiven.contains(&label) {
            self.forgiven.push(label);
        }
    }

    /// True when no device other than the local one satisfies the entry
    fn unsatisfiable_elsewhere(&self, path: &[&str], condition: &Condition, enforce: Option<bool>) -> bool {
        self.all_capabilities
            .iter()
            .filter(|(device_uuid, _)| device_uuid.as_str() != self.local_device_uuid)
            .all(|(_, capabilities)| {
                let mut lenient = Evaluation::new(self.local_device_uuid, self.all_capabilities, false);
                !candidates_at(capabilities.as_map(), path)
                    .into_iter()
                    .any(|capability| lenient.evaluate(path, condition, capability, Combinator::And, enforce))
            })
    }

    fn evaluate(
        &mut self,
        path: &[&str],
        condition: &Condition,
        capability: Option<&Value>,
        combinator: Combinator,
        enforce: Option<bool>,
    ) -> bool {
        match condition {
            Condition::Literal(expected) => literal_matches(expected, capability),

            Condition::List(items) => combinator.combine(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.element(path, index, item, capability, combinator, enforce)),
            ),

            Condition::Operator {
                operator,
                values,
                enforce: own,
            } => {
                let enforce = own.or(enforce);
                match operator {
                    Operator::Compare(comparison) => compare_positional(*comparison, values, capability),
                    Operator::Logical(logical) => logical.combine(
                        values
                            .iter()
                            .enumerate()
                            .map(|(index, value)| self.element(path, index, value, capability, *logical, enforce)),
                    ),
                    Operator::Unrecognized(_) | Operator::Unspecified => Combinator::And.combine(
                        values.iter().enumerate().map(|(index, value)| {
                            self.element(path, index, value, capability, Combinator::And, enforce)
                        }),
                    ),
                }
            }

            Condition::Group {
                combinator: group,
                entries,
                enforce: own,
            } => {
                let enforce = own.or(enforce);
                let record = capability.and_then(Value::as_object);
                group.combine(entries.iter().map(|(key, sub)| {
                    let mut child: Vec<&str> = path.to_vec();
                    child.push(key.as_str());
                    let field = record.and_then(|r| r.get(key));
                    self.entry(&child, sub, candidates(field), sub.enforce().or(enforce))
                }))
            }
        }
    }
}

/// Alternatives a device offers for one value.
///
/// A non-empty array of objects or arrays is a set of variants (e.g. one
/// per screen); anything else is a single value.
fn candidates(value: Option<&Value>) -> Vec<Option<&Value>> {
    match value {
        Some(Value::Array(variants))
            if !variants.is_empty() && variants.iter().all(|v| v.is_object() || v.is_array()) =>
        {
            variants.iter().map(Some).collect()
        }
        other => vec![other],
    }
}

/// All candidate values reachable from `root` along `path`
fn candidates_at<'v>(root: &'v Map<String, Value>, path: &[&str]) -> Vec<Option<&'v Value>> {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return Vec::new(),
    };

    let mut current = candidates(root.get(*first));
    for key in rest {
        current = current
            .into_iter()
            .flat_map(|candidate| {
                candidates(candidate.and_then(Value::as_object).and_then(|r| r.get(*key)))
            })
            .collect();
    }
    current
}

/// Match a literal: `true` checks presence, an array capability checks
/// membership, anything else checks equality.
fn literal_matches(expected: &Value, capability: Option<&Value>) -> bool {
    let actual = match capability {
        Some(actual) => actual,
        None => return false,
    };
    if expected == &Value::Bool(true) {
        return !actual.is_null() && actual != &Value::Bool(false);
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => values_equal(actual, expected),
    }
}

/// Compare each expected element against the capability element at the same
/// position. A scalar capability is a one-element sequence.
fn compare_positional(comparison: Comparison, expected: &[Condition], capability: Option<&Value>) -> bool {
    let actual: Vec<&Value> = match capability {
        None | Some(Value::Null) => return false,
        Some(Value::Array(items)) => items.iter().collect(),
        Some(scalar) => vec![scalar],
    };

    expected
        .iter()
        .enumerate()
        .all(|(position, condition)| match (condition, actual.get(position)) {
            (Condition::Literal(expected), Some(actual)) => comparison.holds(actual, expected),
            _ => false,
        })
}
