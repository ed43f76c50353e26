//! Filter predicates and their evaluation.
//!
//! A [`FilterSpec`] is a conjunction of [`Predicate`]s. There is no OR or
//! grouping: a record is kept only if every predicate matches.
//!
//! Null handling is fixed: a [`Value::Null`] never satisfies any predicate,
//! including equality against another null.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::field::{FieldPath, FieldResolver};
use crate::op::Op;
use crate::value::{Number, Scalar, Timestamp, Value};
use crate::whitelist::{FieldWhitelist, Usage};

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// A single value.
    Scalar(Scalar),
    /// A value set for [`Op::OneOf`].
    Set(Vec<Scalar>),
    /// Inclusive bounds; at least one must be present.
    Range {
        min: Option<Scalar>,
        max: Option<Scalar>,
    },
}

impl Operand {
    fn kind_name(&self) -> &'static str {
        match self {
            Operand::Scalar(s) => s.kind_name(),
            Operand::Range { .. } => "range",
            Operand::Set(_) => "set",
        }
    }
}

impl From<Scalar> for Operand {
    fn from(value: Scalar) -> Self {
        Operand::Scalar(value)
    }
}

impl From<Vec<Scalar>> for Operand {
    fn from(set: Vec<Scalar>) -> Self {
        Operand::Set(set)
    }
}

macro_rules! operand_from_scalar {
    ($($source:ty),+) => {
        $(
            impl From<$source> for Operand {
                fn from(value: $source) -> Self {
                    Operand::Scalar(Scalar::from(value))
                }
            }
        )+
    };
}

operand_from_scalar!(&str, String, bool, Number, Timestamp, i32, i64, u32, u64, usize, f64);

/// A single filter condition.
///
/// ```
/// use listing_query::{Op, Predicate};
///
/// let predicate = Predicate::new("name", Op::Contains, "widget");
/// assert_eq!(predicate.field, "name");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: Op,
    #[serde(rename = "value")]
    pub operand: Operand,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: Op, operand: impl Into<Operand>) -> Self {
        Predicate {
            field: field.into(),
            op,
            operand: operand.into(),
        }
    }

    fn mismatch(&self, actual: &'static str) -> QueryError {
        QueryError::TypeMismatch {
            field: self.field.clone(),
            op: self.op.as_str(),
            expected: self.op.expects(),
            actual,
        }
    }

    /// Checks that the operand shape fits the operator.
    fn check_operand(&self) -> Result<()> {
        let fits = match (self.op, &self.operand) {
            (Op::Equals, Operand::Scalar(_)) => true,
            (Op::Contains, Operand::Scalar(Scalar::String(_))) => true,
            (Op::GreaterThan | Op::LessThan, Operand::Scalar(s)) => is_ordinal(s),
            (Op::Range, Operand::Range { min, max }) => {
                (min.is_some() || max.is_some())
                    && min.iter().chain(max.iter()).all(is_ordinal)
            }
            (Op::BoolEquals, Operand::Scalar(Scalar::Bool(_))) => true,
            (Op::OneOf, Operand::Set(_)) => true,
            _ => false,
        };

        if fits {
            Ok(())
        } else {
            Err(self.mismatch(self.operand.kind_name()))
        }
    }

    /// Evaluates this predicate against a resolved field value.
    ///
    /// Returns [`QueryError::TypeMismatch`] when the value type cannot be
    /// compared with this operator (e.g. `contains` on a boolean).
    pub fn evaluate(&self, value: &Value<'_>) -> Result<bool> {
        if value.is_null() {
            return Ok(false);
        }

        match (&self.operand, self.op) {
            (Operand::Scalar(expected), Op::Equals) => {
                scalar_equals(value, expected).ok_or_else(|| self.mismatch(value.kind_name()))
            }
            (Operand::Scalar(Scalar::String(needle)), Op::Contains) => match value {
                Value::String(s) => Ok(contains_ignore_case(s, needle)),
                other => Err(self.mismatch(other.kind_name())),
            },
            (Operand::Scalar(bound), Op::GreaterThan | Op::LessThan) => {
                let field = value
                    .as_ordinal()
                    .ok_or_else(|| self.mismatch(value.kind_name()))?;
                Ok(ordinal(bound)
                    .and_then(|bound| field.compare(bound))
                    .is_some_and(|ordering| self.op.eval_ordering(ordering)))
            }
            (Operand::Range { min, max }, Op::Range) => {
                let field = value
                    .as_ordinal()
                    .ok_or_else(|| self.mismatch(value.kind_name()))?;
                let above_min = match min.as_ref().and_then(ordinal) {
                    Some(min) => field.compare(min).is_some_and(|o| o.is_ge()),
                    None => true,
                };
                let below_max = match max.as_ref().and_then(ordinal) {
                    Some(max) => field.compare(max).is_some_and(|o| o.is_le()),
                    None => true,
                };
                Ok(above_min && below_max)
            }
            (Operand::Scalar(Scalar::Bool(expected)), Op::BoolEquals) => match value {
                Value::Bool(b) => Ok(b == expected),
                other => Err(self.mismatch(other.kind_name())),
            },
            (Operand::Set(set), Op::OneOf) => {
                for candidate in set {
                    match scalar_equals(value, candidate) {
                        Some(true) => return Ok(true),
                        Some(false) => {}
                        None => return Err(self.mismatch(value.kind_name())),
                    }
                }
                Ok(false)
            }
            _ => Err(self.mismatch(self.operand.kind_name())),
        }
    }
}

fn is_ordinal(scalar: &Scalar) -> bool {
    ordinal(scalar).is_some()
}

fn ordinal(scalar: &Scalar) -> Option<Number> {
    scalar.as_value().as_ordinal()
}

/// Equality with coercion. `None` means the types cannot be compared.
fn scalar_equals(value: &Value<'_>, expected: &Scalar) -> Option<bool> {
    match (value, expected) {
        (Value::String(a), Scalar::String(b)) => Some(*a == b.as_str()),
        (Value::Bool(a), Scalar::Bool(b)) => Some(a == b),
        (Value::Number(_) | Value::Timestamp(_), Scalar::Number(_) | Scalar::Timestamp(_)) => {
            let a = value.as_ordinal()?;
            let b = ordinal(expected)?;
            Some(a.compare(b).is_some_and(|o| o.is_eq()))
        }
        _ => None,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// An AND-combination of predicates.
///
/// # Example
///
/// ```
/// use listing_query::FilterSpec;
///
/// let filter = FilterSpec::new()
///     .bool_equals("active", true)
///     .range("price", Some(10i64), Some(50i64))
///     .contains("name", "wid");
///
/// assert_eq!(filter.predicates().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    /// Creates an empty filter, which keeps every record.
    pub fn new() -> Self {
        FilterSpec::default()
    }

    pub fn from_predicates(predicates: Vec<Predicate>) -> Self {
        FilterSpec { predicates }
    }

    /// Adds a predicate.
    pub fn and(mut self, field: &str, op: Op, operand: impl Into<Operand>) -> Self {
        self.predicates.push(Predicate::new(field, op, operand));
        self
    }

    pub fn equals(self, field: &str, value: impl Into<Scalar>) -> Self {
        self.and(field, Op::Equals, value.into())
    }

    pub fn contains(self, field: &str, needle: &str) -> Self {
        self.and(field, Op::Contains, needle)
    }

    pub fn greater_than(self, field: &str, value: impl Into<Scalar>) -> Self {
        self.and(field, Op::GreaterThan, value.into())
    }

    pub fn less_than(self, field: &str, value: impl Into<Scalar>) -> Self {
        self.and(field, Op::LessThan, value.into())
    }

    /// Inclusive range; either bound may be omitted.
    pub fn range<S: Into<Scalar>>(self, field: &str, min: Option<S>, max: Option<S>) -> Self {
        self.and(
            field,
            Op::Range,
            Operand::Range {
                min: min.map(Into::into),
                max: max.map(Into::into),
            },
        )
    }

    pub fn between_timestamps(self, field: &str, from: Timestamp, to: Timestamp) -> Self {
        self.range(field, Some(from), Some(to))
    }

    pub fn bool_equals(self, field: &str, value: bool) -> Self {
        self.and(field, Op::BoolEquals, value)
    }

    pub fn one_of<I, S>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.and(field, Op::OneOf, Operand::Set(set))
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Validates every predicate against the whitelist and returns the
    /// filter ready for evaluation.
    ///
    /// No record is touched here, so an invalid field fails before any work.
    pub fn compile<W>(&self, whitelist: &W) -> Result<CompiledFilter<'_>>
    where
        W: FieldWhitelist + ?Sized,
    {
        let mut compiled = Vec::with_capacity(self.predicates.len());
        for predicate in &self.predicates {
            let path = FieldPath::parse(&predicate.field, Usage::Filter)?;
            if !whitelist.allows(Usage::Filter, path.as_str()) {
                return Err(QueryError::invalid_field(&predicate.field, Usage::Filter));
            }
            predicate.check_operand()?;
            compiled.push((path, predicate));
        }
        Ok(CompiledFilter {
            predicates: compiled,
        })
    }
}

/// A validated filter with parsed field paths.
#[derive(Debug, Clone)]
pub struct CompiledFilter<'s> {
    predicates: Vec<(FieldPath, &'s Predicate)>,
}

impl CompiledFilter<'_> {
    /// Returns `true` if the record satisfies every predicate.
    ///
    /// Evaluation stops at the first predicate that fails or errors.
    pub fn matches<T, R>(&self, record: &T, resolver: &R) -> Result<bool>
    where
        T: ?Sized,
        R: FieldResolver<T> + ?Sized,
    {
        for (path, predicate) in &self.predicates {
            if !predicate.evaluate(&resolver.resolve(record, path))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Keeps the records that match, preserving input order.
    pub fn apply<'a, T, R>(&self, records: &'a [T], resolver: &R) -> Result<Vec<&'a T>>
    where
        R: FieldResolver<T> + ?Sized,
    {
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if self.matches(record, resolver)? {
                kept.push(record);
            }
        }
        Ok(kept)
    }
}
