//! Resolved field values and owned comparison operands.
//!
//! A [`Value`] is what a field resolver returns for one record: it borrows
//! from the record and lives only for the duration of a comparison. A
//! [`Scalar`] is the owned counterpart stored inside filter predicates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Runtime value of a field, borrowed from the source record.
///
/// # Example
///
/// ```
/// use listing_query::{Number, Value};
///
/// struct Product {
///     name: String,
///     price: u32,
/// }
///
/// fn accessor<'a>(product: &'a Product, field: &str) -> Value<'a> {
///     match field {
///         "name" => Value::String(&product.name),
///         "price" => Value::Number(Number::U64(product.price as u64)),
///         _ => Value::Null,
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// String value (borrowed).
    String(&'a str),
    /// Numeric value.
    Number(Number),
    /// Timestamp value (milliseconds since Unix epoch).
    Timestamp(Timestamp),
    /// Boolean value.
    Bool(bool),
    /// Field not applicable to this record, or unset.
    Null,
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the name of this value's type, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Timestamp(_) => "timestamp",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        }
    }

    /// Converts to a number on the shared numeric/timestamp axis.
    ///
    /// Timestamps compare as their millisecond count so that a numeric
    /// operand can be used against a timestamp field and vice versa.
    pub(crate) fn as_ordinal(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Timestamp(t) => Some(Number::I64(t.as_millis())),
            _ => None,
        }
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::String(s)
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value<'_> {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<Timestamp> for Value<'_> {
    fn from(t: Timestamp) -> Self {
        Value::Timestamp(t)
    }
}

/// Numeric value preserving the precision of its source type.
///
/// Integers of mixed signedness compare exactly; any comparison involving a
/// float goes through `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers exactly. Returns `None` when either side is NaN.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(&b),
            (Number::F64(a), b) => cmp_int_float(b.as_i128()?, a).map(Ordering::reverse),
            (a, Number::F64(b)) => cmp_int_float(a.as_i128()?, b),
            (a, b) => Some(a.as_i128()?.cmp(&b.as_i128()?)),
        }
    }

    fn as_i128(self) -> Option<i128> {
        match self {
            Number::I64(n) => Some(n as i128),
            Number::U64(n) => Some(n as i128),
            Number::F64(_) => None,
        }
    }

    /// Total ordering for sorting: NaN falls back to `f64::total_cmp`.
    pub fn total_cmp(self, other: Number) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.to_f64().total_cmp(&other.to_f64()))
    }
}

/// Compares an integer with a float without rounding the integer to `f64`.
fn cmp_int_float(int: i128, float: f64) -> Option<Ordering> {
    // 2^127: every integer the two integer variants can hold is below it.
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

    if float.is_nan() {
        return None;
    }
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    let by_whole = int.cmp(&(whole as i128));
    if by_whole != Ordering::Equal {
        return Some(by_whole);
    }
    // Integer parts agree; the fraction decides.
    0.0f64.partial_cmp(&(float - whole))
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

macro_rules! number_from {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for Number {
                fn from(n: $source) -> Self {
                    Number::$variant(n as $target)
                }
            }
        )+
    };
}

number_from!(I64 as i64: i8, i16, i32, i64, isize);
number_from!(U64 as u64: u8, u16, u32, u64, usize);
number_from!(F64 as f64: f32, f64);

/// Timestamp in milliseconds since the Unix epoch.
///
/// ```
/// use listing_query::Timestamp;
///
/// assert!(Timestamp::from_secs(1) < Timestamp::from_millis(1500));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn from_secs(secs: i64) -> Self {
        Timestamp(secs * 1000)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn as_secs(self) -> i64 {
        self.0 / 1000
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Timestamp(millis)
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(time: std::time::SystemTime) -> Self {
        match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => Timestamp(d.as_millis() as i64),
            Err(e) => Timestamp(-(e.duration().as_millis() as i64)),
        }
    }
}

/// Owned comparison operand stored in a filter predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    String(String),
    Number(Number),
    Timestamp(Timestamp),
    Bool(bool),
}

impl Scalar {
    /// Borrows this operand as a [`Value`].
    pub fn as_value(&self) -> Value<'_> {
        match self {
            Scalar::String(s) => Value::String(s),
            Scalar::Number(n) => Value::Number(*n),
            Scalar::Timestamp(t) => Value::Timestamp(*t),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.as_value().kind_name()
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<Number> for Scalar {
    fn from(n: Number) -> Self {
        Scalar::Number(n)
    }
}

impl From<Timestamp> for Scalar {
    fn from(t: Timestamp) -> Self {
        Scalar::Timestamp(t)
    }
}

macro_rules! scalar_from_number {
    ($($source:ty),+) => {
        $(
            impl From<$source> for Scalar {
                fn from(n: $source) -> Self {
                    Scalar::Number(Number::from(n))
                }
            }
        )+
    };
}

scalar_from_number!(i32, i64, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_extractors() {
        assert_eq!(Value::String("hello").as_str(), Some("hello"));
        assert_eq!(
            Value::Number(Number::I64(42)).as_number(),
            Some(Number::I64(42))
        );
        assert_eq!(
            Value::Timestamp(Timestamp(1000)).as_timestamp(),
            Some(Timestamp(1000))
        );
        assert_eq!(Value::Bool(true).as_bool(), Some(true));

        assert_eq!(Value::String("test").as_number(), None);
        assert_eq!(Value::Null.as_str(), None);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn option_converts_to_null() {
        let missing: Option<&str> = None;
        assert_eq!(Value::from(missing), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x"));
    }

    #[test]
    fn number_comparisons_mixed_types() {
        assert_eq!(
            Number::I64(5).compare(Number::U64(10)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Number::I64(-1).compare(Number::U64(u64::MAX)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Number::I64(5).compare(Number::F64(5.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Number::U64(10).compare(Number::F64(5.5)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn integer_float_comparison_is_exact_past_2_pow_53() {
        let p53 = 1i64 << 53;
        let float = Number::F64(p53 as f64);

        assert_eq!(Number::I64(p53).compare(float), Some(Ordering::Equal));
        assert_eq!(float.compare(Number::I64(p53 + 1)), Some(Ordering::Less));
        assert_eq!(Number::I64(p53 + 1).compare(float), Some(Ordering::Greater));
        assert_eq!(
            Number::U64(u64::MAX).compare(Number::F64(u64::MAX as f64)),
            Some(Ordering::Less)
        );

        // Transitive across the boundary: p53 == float < p53 + 1.
        let ordered = [Number::I64(p53), float, Number::I64(p53 + 1)];
        assert_eq!(ordered[0].total_cmp(ordered[2]), Ordering::Less);
        assert_eq!(ordered[1].total_cmp(ordered[2]), Ordering::Less);
    }

    #[test]
    fn integer_float_fractions_and_extremes() {
        assert_eq!(Number::I64(-5).compare(Number::F64(-5.5)), Some(Ordering::Greater));
        assert_eq!(Number::I64(-6).compare(Number::F64(-5.5)), Some(Ordering::Less));
        assert_eq!(Number::I64(0).compare(Number::F64(-0.0)), Some(Ordering::Equal));
        assert_eq!(
            Number::U64(u64::MAX).compare(Number::F64(f64::INFINITY)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Number::I64(i64::MIN).compare(Number::F64(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
        assert_eq!(Number::F64(1e300).compare(Number::I64(i64::MAX)), Some(Ordering::Greater));
        assert_eq!(Number::I64(3).compare(Number::F64(f64::NAN)), None);
    }

    #[test]
    fn number_nan_has_no_partial_order_but_sorts() {
        assert_eq!(Number::F64(f64::NAN).compare(Number::F64(1.0)), None);
        assert_eq!(
            Number::F64(f64::NAN).total_cmp(Number::F64(1.0)),
            Ordering::Greater
        );
    }

    #[test]
    fn timestamp_is_ordinal() {
        assert_eq!(
            Value::Timestamp(Timestamp(1500)).as_ordinal(),
            Some(Number::I64(1500))
        );
        assert_eq!(Value::Bool(true).as_ordinal(), None);
        assert_eq!(Timestamp::from_secs(2).as_millis(), 2000);
    }

    #[test]
    fn scalar_serde_shape() {
        let json = serde_json::to_string(&Scalar::from(10i64)).unwrap();
        assert_eq!(json, r#"{"number":10}"#);

        let back: Scalar = serde_json::from_str(r#"{"timestamp":1700000000000}"#).unwrap();
        assert_eq!(back, Scalar::Timestamp(Timestamp(1_700_000_000_000)));
    }
}
