//! Field paths and the resolver capability.
//!
//! The engine never inspects record types. It asks a [`FieldResolver`] for
//! the value behind a [`FieldPath`], and the resolver is supplied per entity
//! kind by the caller.

use std::fmt;

use crate::error::{QueryError, Result};
use crate::value::Value;
use crate::whitelist::Usage;

/// A validated field reference: `name` or `relation.name`.
///
/// Only one level of relation traversal is supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    split: Option<usize>,
}

impl FieldPath {
    /// Parses a dotted field path.
    ///
    /// `usage` only feeds the error message when the path is malformed.
    pub fn parse(raw: &str, usage: Usage) -> Result<Self> {
        let mut segments = raw.split('.');
        let first = segments.next().unwrap_or_default();
        let second = segments.next();

        if first.is_empty() || second == Some("") || segments.next().is_some() {
            return Err(QueryError::invalid_field(raw, usage));
        }

        Ok(FieldPath {
            raw: raw.to_string(),
            split: second.map(|_| first.len()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The relation segment of `relation.name`, if any.
    pub fn relation(&self) -> Option<&str> {
        self.split.map(|at| &self.raw[..at])
    }

    /// The final field segment.
    pub fn name(&self) -> &str {
        match self.split {
            Some(at) => &self.raw[at + 1..],
            None => &self.raw,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A record that exposes its fields by name.
///
/// # Example
///
/// ```
/// use listing_query::{Number, Record, Value};
///
/// struct Payment {
///     name: String,
/// }
///
/// struct Attribute {
///     label: String,
///     payment: Option<Payment>,
/// }
///
/// impl Record for Payment {
///     fn field(&self, name: &str) -> Value<'_> {
///         match name {
///             "name" => Value::String(&self.name),
///             _ => Value::Null,
///         }
///     }
/// }
///
/// impl Record for Attribute {
///     fn field(&self, name: &str) -> Value<'_> {
///         match name {
///             "label" => Value::String(&self.label),
///             _ => Value::Null,
///         }
///     }
///
///     fn related(&self, relation: &str) -> Option<&dyn Record> {
///         match relation {
///             "payment" => self.payment.as_ref().map(|p| p as &dyn Record),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record {
    /// Returns the value of a direct field, or [`Value::Null`] if unset.
    fn field(&self, name: &str) -> Value<'_>;

    /// Returns a related record for one level of traversal.
    fn related(&self, _relation: &str) -> Option<&dyn Record> {
        None
    }
}

/// Resolves field paths against records of type `T`.
///
/// Implemented for plain accessor functions (`fn(&T, &str) -> Value`), which
/// receive the full dotted path, and for [`RecordFields`].
pub trait FieldResolver<T: ?Sized> {
    fn resolve<'a>(&self, record: &'a T, path: &FieldPath) -> Value<'a>;
}

impl<T: ?Sized, F> FieldResolver<T> for F
where
    F: for<'a> Fn(&'a T, &str) -> Value<'a>,
{
    fn resolve<'a>(&self, record: &'a T, path: &FieldPath) -> Value<'a> {
        self(record, path.as_str())
    }
}

/// Resolver for types implementing [`Record`].
///
/// A missing relation resolves to [`Value::Null`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFields;

impl<T: Record> FieldResolver<T> for RecordFields {
    fn resolve<'a>(&self, record: &'a T, path: &FieldPath) -> Value<'a> {
        match path.relation() {
            None => record.field(path.name()),
            Some(relation) => match record.related(relation) {
                Some(related) => related.field(path.name()),
                None => Value::Null,
            },
        }
    }
}
