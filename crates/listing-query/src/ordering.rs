//! Sort keys and the record comparator.
//!
//! Provides [`Dir`] for sort direction, [`OrderBy`] for one key and
//! [`SortSpec`] for an ordered list of keys.
//!
//! Null values sort last in both directions. Values of different types are
//! ordered by type (bool, then number/timestamp, then string) so that the
//! comparator remains a total preorder on mixed data.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::field::{FieldPath, FieldResolver};
use crate::search::Hit;
use crate::value::Value;
use crate::whitelist::{FieldWhitelist, Usage, RELEVANCE_FIELD};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Applies this direction to an ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub dir: Dir,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy::new(field, Dir::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy::new(field, Dir::Desc)
    }

    pub fn new(field: impl Into<String>, dir: Dir) -> Self {
        OrderBy {
            field: field.into(),
            dir,
        }
    }

    /// Compares two values under this key. Nulls go last whatever the
    /// direction.
    pub fn compare(&self, a: &Value<'_>, b: &Value<'_>) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.dir.apply(compare_values(a, b)),
        }
    }
}

fn kind_rank(value: &Value<'_>) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) | Value::Timestamp(_) => 1,
        Value::String(_) => 2,
        Value::Null => 3,
    }
}

/// Total order over values.
///
/// Numbers and timestamps share one axis; NaN sorts after every other
/// number; null is greatest.
pub fn compare_values(a: &Value<'_>, b: &Value<'_>) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => match (a.as_ordinal(), b.as_ordinal()) {
            (Some(x), Some(y)) => x.total_cmp(y),
            _ => kind_rank(a).cmp(&kind_rank(b)),
        },
    }
}

/// Ordered list of sort keys, primary first.
///
/// Parses from the compact `-price,name` form, where a leading `-` means
/// descending.
///
/// ```
/// use listing_query::{Dir, OrderBy, SortSpec};
///
/// let spec: SortSpec = "-price,name".parse().unwrap();
/// assert_eq!(spec.keys(), &[OrderBy::desc("price"), OrderBy::asc("name")]);
///
/// let built = SortSpec::new().desc("price").asc("name");
/// assert_eq!(built, spec);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec {
    keys: Vec<OrderBy>,
}

impl SortSpec {
    pub fn new() -> Self {
        SortSpec::default()
    }

    pub fn by(mut self, field: &str, dir: Dir) -> Self {
        self.keys.push(OrderBy::new(field, dir));
        self
    }

    pub fn asc(self, field: &str) -> Self {
        self.by(field, Dir::Asc)
    }

    pub fn desc(self, field: &str) -> Self {
        self.by(field, Dir::Desc)
    }

    /// Sorts by search relevance, highest first.
    pub fn by_relevance(self) -> Self {
        self.by(RELEVANCE_FIELD, Dir::Desc)
    }

    pub fn keys(&self) -> &[OrderBy] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Validates every key against the whitelist.
    ///
    /// [`RELEVANCE_FIELD`] is always accepted.
    pub fn compile<W>(&self, whitelist: &W) -> Result<CompiledSort>
    where
        W: FieldWhitelist + ?Sized,
    {
        let mut keys = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let target = if key.field == RELEVANCE_FIELD {
                SortTarget::Relevance
            } else {
                let path = FieldPath::parse(&key.field, Usage::Sort)?;
                if !whitelist.allows(Usage::Sort, path.as_str()) {
                    return Err(QueryError::invalid_field(&key.field, Usage::Sort));
                }
                SortTarget::Field(path)
            };
            keys.push((target, key.clone()));
        }
        Ok(CompiledSort { keys })
    }
}

impl FromStr for SortSpec {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let mut spec = SortSpec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            spec = match part.strip_prefix('-') {
                Some("") => return Err(QueryError::invalid_field(part, Usage::Sort)),
                Some(field) => spec.desc(field),
                None => spec.asc(part),
            };
        }
        Ok(spec)
    }
}

#[derive(Debug, Clone)]
enum SortTarget {
    Field(FieldPath),
    Relevance,
}

/// A validated sort specification.
#[derive(Debug, Clone)]
pub struct CompiledSort {
    keys: Vec<(SortTarget, OrderBy)>,
}

impl CompiledSort {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compares two hits key by key; the first non-equal key decides.
    pub fn compare<T, R>(&self, a: &Hit<'_, T>, b: &Hit<'_, T>, resolver: &R) -> Ordering
    where
        R: FieldResolver<T> + ?Sized,
    {
        for (target, order_by) in &self.keys {
            let ordering = match target {
                SortTarget::Field(path) => order_by.compare(
                    &resolver.resolve(a.record, path),
                    &resolver.resolve(b.record, path),
                ),
                SortTarget::Relevance => order_by
                    .dir
                    .apply(a.result.score.total_cmp(&b.result.score)),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Sorts hits in place. The sort is stable, so ties keep input order.
    pub fn sort<T, R>(&self, hits: &mut [Hit<'_, T>], resolver: &R)
    where
        R: FieldResolver<T> + ?Sized,
    {
        if self.keys.is_empty() {
            return;
        }
        hits.sort_by(|a, b| self.compare(a, b, resolver));
    }
}
