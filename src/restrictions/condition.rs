//! Condition trees
//!
//! Restriction conditions arrive as loosely-shaped JSON. They are parsed
//! once, at load time, into [`Condition`] and never re-inspected as JSON.
//!
//! Shapes:
//! - scalar → [`Condition::Literal`]
//! - array → [`Condition::List`]
//! - object with `value` or `values` → [`Condition::Operator`]
//! - any other object → [`Condition::Group`], keyed by capability type
//!
//! Parsing never fails. Unknown operators are kept as
//! [`Operator::Unrecognized`] and evaluate like plain equality.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub(crate) const VALUE_KEY: &str = "value";
pub(crate) const VALUES_KEY: &str = "values";
pub(crate) const OPERATOR_KEY: &str = "operator";
pub(crate) const ENFORCE_KEY: &str = "enforce";

/// Logical combinator applied over a set of sub-results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    /// Every sub-condition must hold
    #[default]
    And,
    /// At least one sub-condition must hold
    Or,
    /// Not every sub-condition holds
    Not,
}

impl Combinator {
    /// Parse `AND` / `OR` / `NOT` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            "NOT" => Some(Self::Not),
            _ => None,
        }
    }

    /// Combine lazily evaluated results
    pub fn combine(self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut results = results.into_iter();
        match self {
            Self::And => results.all(|r| r),
            Self::Or => results.any(|r| r),
            Self::Not => !results.all(|r| r),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }
}

/// Positional comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    /// Parse `=`, `!`, `>`, `>=`, `<`, `<=` (`==` and `!=` accepted too)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" | "==" => Some(Self::Eq),
            "!" | "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// Check `actual <op> expected`.
    ///
    /// Numbers compare numerically and strings lexicographically; any other
    /// pairing only supports (in)equality.
    pub fn holds(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Eq => values_equal(actual, expected),
            Self::Ne => !values_equal(actual, expected),
            Self::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
            Self::Ge => matches!(
                compare_values(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt => compare_values(actual, expected) == Some(Ordering::Less),
            Self::Le => matches!(
                compare_values(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Operator of a `{value(s), operator}` wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Compare(Comparison),
    Logical(Combinator),
    /// Unknown operator string; evaluated as plain equality
    Unrecognized(String),
    /// No operator given; evaluated as plain equality
    Unspecified,
}

impl Operator {
    /// Parse the `operator` field of a wrapper
    pub fn parse(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Comparison::parse(s)
                .map(Self::Compare)
                .or_else(|| Combinator::parse(s).map(Self::Logical))
                .unwrap_or_else(|| Self::Unrecognized(s.clone())),
            _ => Self::Unspecified,
        }
    }
}

/// A parsed restriction condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A scalar to test for equality, membership or presence
    Literal(Value),
    /// Sub-conditions combined with the ambient combinator
    List(Vec<Condition>),
    /// `{value(s), operator, enforce}` wrapper
    Operator {
        operator: Operator,
        values: Vec<Condition>,
        enforce: Option<bool>,
    },
    /// Capability type → sub-condition, combined with `combinator`
    Group {
        combinator: Combinator,
        entries: BTreeMap<String, Condition>,
        enforce: Option<bool>,
    },
}

impl Condition {
    /// Parse a JSON condition. Never fails.
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.iter().map(Self::parse).collect()),
            Value::Object(map) if map.contains_key(VALUE_KEY) || map.contains_key(VALUES_KEY) => {
                Self::parse_operator(map)
            }
            Value::Object(map) => Self::parse_group(map),
            scalar => Self::Literal(scalar.clone()),
        }
    }

    fn parse_operator(map: &Map<String, Value>) -> Self {
        let raw = map
            .get(VALUES_KEY)
            .filter(|v| !v.is_null())
            .or_else(|| map.get(VALUE_KEY))
            .cloned()
            .unwrap_or(Value::Null);
        let values = match raw {
            Value::Array(items) => items.iter().map(Self::parse).collect(),
            single => vec![Self::parse(&single)],
        };

        Self::Operator {
            operator: Operator::parse(map.get(OPERATOR_KEY)),
            values,
            enforce: map.get(ENFORCE_KEY).and_then(Value::as_bool),
        }
    }

    fn parse_group(map: &Map<String, Value>) -> Self {
        let combinator = map
            .get(OPERATOR_KEY)
            .and_then(Value::as_str)
            .and_then(Combinator::parse)
            .unwrap_or_default();
        let entries = map
            .iter()
            .filter(|(key, _)| key.as_str() != OPERATOR_KEY && key.as_str() != ENFORCE_KEY)
            .map(|(key, value)| (key.clone(), Self::parse(value)))
            .collect();

        Self::Group {
            combinator,
            entries,
            enforce: map.get(ENFORCE_KEY).and_then(Value::as_bool),
        }
    }

    /// The condition's own `enforce` flag, if it declares one
    pub fn enforce(&self) -> Option<bool> {
        match self {
            Self::Operator { enforce, .. } | Self::Group { enforce, .. } => *enforce,
            Self::Literal(_) | Self::List(_) => None,
        }
    }
}

/// Equality with numbers compared by value (`96` equals `96.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering for numbers and strings; `None` for anything else
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
