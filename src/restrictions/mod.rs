//! Component restrictions
//!
//! Administrator-defined conditions under which each UI component is shown,
//! and the matcher that checks them against device capabilities.
//!
//! # Evaluation
//!
//! - Entries of a restriction are combined with AND
//! - A device offering several variants of a capability satisfies an entry
//!   when any one variant does
//! - Malformed conditions degrade to equality checks instead of failing

mod condition;
mod matcher;
mod restriction;

pub use condition::{compare_values, values_equal, Combinator, Comparison, Condition, Operator};
pub use matcher::ConditionMatcher;
pub use restriction::{parse_restrictions, Restriction, Restrictions, SHOW_BY_DEFAULT_KEY};
