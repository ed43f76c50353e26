//! Filter operators.
//!
//! The [`Op`] enum lists the predicate operators a filter supports. Not every
//! operator accepts every value type; see [`Op::expects`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Comparison operator for a filter predicate.
///
/// - **Any scalar**: `Equals`, `OneOf`
/// - **String**: `Contains` (case-insensitive)
/// - **Number/Timestamp**: `GreaterThan`, `LessThan`, `Range`
/// - **Bool**: `BoolEquals`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Exact match after numeric/timestamp coercion.
    Equals,
    /// Case-insensitive substring match.
    Contains,
    /// Strictly greater than.
    GreaterThan,
    /// Strictly less than.
    LessThan,
    /// Within inclusive bounds.
    Range,
    /// Boolean equality.
    BoolEquals,
    /// Member of a value set.
    OneOf,
}

impl Op {
    /// Returns `true` if this operator orders values rather than matching them.
    pub fn is_ordering_op(self) -> bool {
        matches!(self, Op::GreaterThan | Op::LessThan | Op::Range)
    }

    /// Describes the value type this operator accepts, for error messages.
    pub fn expects(self) -> &'static str {
        match self {
            Op::Equals | Op::OneOf => "string, number, timestamp or bool",
            Op::Contains => "string",
            Op::GreaterThan | Op::LessThan | Op::Range => "number or timestamp",
            Op::BoolEquals => "bool",
        }
    }

    /// Evaluates a strict comparison given the field-vs-operand ordering.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::GreaterThan => ordering == Ordering::Greater,
            Op::LessThan => ordering == Ordering::Less,
            Op::Equals | Op::BoolEquals | Op::OneOf => ordering == Ordering::Equal,
            Op::Contains | Op::Range => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Equals => "equals",
            Op::Contains => "contains",
            Op::GreaterThan => "greater_than",
            Op::LessThan => "less_than",
            Op::Range => "range",
            Op::BoolEquals => "bool_equals",
            Op::OneOf => "one_of",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_eval_ordering() {
        assert!(Op::GreaterThan.eval_ordering(Ordering::Greater));
        assert!(!Op::GreaterThan.eval_ordering(Ordering::Equal));
        assert!(Op::LessThan.eval_ordering(Ordering::Less));
        assert!(!Op::LessThan.eval_ordering(Ordering::Equal));
        assert!(Op::Equals.eval_ordering(Ordering::Equal));
        assert!(!Op::Contains.eval_ordering(Ordering::Equal));
    }

    #[test]
    fn op_kinds() {
        assert!(Op::Range.is_ordering_op());
        assert!(!Op::OneOf.is_ordering_op());
        assert_eq!(Op::Contains.expects(), "string");
    }

    #[test]
    fn op_display_matches_serde_name() {
        assert_eq!(Op::GreaterThan.to_string(), "greater_than");
        assert_eq!(
            serde_json::to_string(&Op::BoolEquals).unwrap(),
            r#""bool_equals""#
        );
    }
}
