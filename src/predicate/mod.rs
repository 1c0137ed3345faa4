//! Predicate Evaluator
//!
//! Boolean expression trees over property values, used to select which
//! backing entities a read/update/delete request applies to.
//!
//! Evaluation is a single recursive pure function over a property map: the
//! same predicate can be evaluated against any number of candidate resources.
//! A missing predicate (`None`) matches everything.

mod builder;

pub use builder::{PredicateBuildError, PredicateBuilder};

use crate::resource::{lookup_property, PropertyMap};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operator of a [`Predicate::Compare`] node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    NotEquals,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    /// Apply the operator to a property value and a literal (both in string form)
    pub fn apply(self, actual: &str, expected: &str) -> bool {
        let ordering = compare_literals(actual, expected);
        match self {
            CompareOp::Equals => ordering == Ordering::Equal,
            CompareOp::NotEquals => ordering != Ordering::Equal,
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Greater => ordering == Ordering::Greater,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "!=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
        }
    }
}

/// Immutable boolean expression tree over property ids and literals
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    AlwaysTrue,
    Compare {
        property_id: String,
        op: CompareOp,
        value: String,
    },
    /// Membership in a collection value, or key presence in a mapping value
    Contains {
        property_id: String,
        value: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn equals(property_id: &str, value: impl ToString) -> Self {
        Self::compare(property_id, CompareOp::Equals, value)
    }

    pub fn compare(property_id: &str, op: CompareOp, value: impl ToString) -> Self {
        Predicate::Compare {
            property_id: property_id.to_string(),
            op,
            value: value.to_string(),
        }
    }

    pub fn contains(property_id: &str, value: impl ToString) -> Self {
        Predicate::Contains {
            property_id: property_id.to_string(),
            value: value.to_string(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    /// Evaluate against one resource's properties.
    ///
    /// An absent property never satisfies a comparison or a `Contains`.
    /// Collections and mappings never satisfy a scalar comparison.
    pub fn evaluate(&self, properties: &PropertyMap) -> bool {
        match self {
            Predicate::AlwaysTrue => true,
            Predicate::Compare {
                property_id,
                op,
                value,
            } => lookup_property(properties, property_id)
                .and_then(scalar_string)
                .is_some_and(|actual| op.apply(&actual, value)),
            Predicate::Contains { property_id, value } => {
                match lookup_property(properties, property_id) {
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(scalar_string)
                        .any(|item| item == value.as_str()),
                    Some(Value::Object(map)) => map.contains_key(value),
                    _ => false,
                }
            }
            Predicate::And(predicates) => predicates.iter().all(|p| p.evaluate(properties)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.evaluate(properties)),
            Predicate::Not(predicate) => !predicate.evaluate(properties),
        }
    }

    /// Literal `key_property_id` must equal for the predicate to hold, if any.
    ///
    /// Only a top-level equality, or an equality inside a top-level
    /// conjunction, pins the key; anything else returns `None`.
    pub fn key_value(&self, key_property_id: &str) -> Option<&str> {
        match self {
            Predicate::Compare {
                property_id,
                op: CompareOp::Equals,
                value,
            } if property_id == key_property_id => Some(value.as_str()),
            Predicate::And(predicates) => predicates
                .iter()
                .find_map(|p| p.key_value(key_property_id)),
            _ => None,
        }
    }

    /// Property ids referenced anywhere in the tree
    pub fn property_ids(&self) -> BTreeSet<&str> {
        let mut ids = BTreeSet::new();
        self.collect_property_ids(&mut ids);
        ids
    }

    fn collect_property_ids<'a>(&'a self, ids: &mut BTreeSet<&'a str>) {
        match self {
            Predicate::AlwaysTrue => {}
            Predicate::Compare { property_id, .. } | Predicate::Contains { property_id, .. } => {
                ids.insert(property_id.as_str());
            }
            Predicate::And(predicates) | Predicate::Or(predicates) => {
                for p in predicates {
                    p.collect_property_ids(ids);
                }
            }
            Predicate::Not(predicate) => predicate.collect_property_ids(ids),
        }
    }
}

/// Evaluate an optional predicate; `None` matches everything
pub fn evaluate(predicate: Option<&Predicate>, properties: &PropertyMap) -> bool {
    predicate.map_or(true, |p| p.evaluate(properties))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::AlwaysTrue => f.write_str("TRUE"),
            Predicate::Compare {
                property_id,
                op,
                value,
            } => write!(f, "{}{}{:?}", property_id, op.symbol(), value),
            Predicate::Contains { property_id, value } => {
                write!(f, "{} CONTAINS {:?}", property_id, value)
            }
            Predicate::And(predicates) => write_joined(f, predicates, " AND ", "TRUE"),
            Predicate::Or(predicates) => write_joined(f, predicates, " OR ", "FALSE"),
            Predicate::Not(predicate) => write!(f, "NOT({})", predicate),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    predicates: &[Predicate],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    match predicates {
        [] => f.write_str(empty),
        [single] => write!(f, "{}", single),
        _ => {
            f.write_str("(")?;
            for (i, p) in predicates.iter().enumerate() {
                if i > 0 {
                    f.write_str(separator)?;
                }
                write!(f, "{}", p)?;
            }
            f.write_str(")")
        }
    }
}

/// String form of a scalar JSON value
fn scalar_string(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Numeric ordering when both sides are numbers, lexicographic otherwise
fn compare_literals(actual: &str, expected: &str) -> Ordering {
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or_else(|| actual.cmp(expected)),
        _ => actual.cmp(expected),
    }
}
