//! Strict and loose (coercive) equality over JSON attribute values.
//!
//! Attribute values often round-trip through HTML forms as strings while the
//! stored copy is typed, so `"1"` and `1` must be able to compare equal.

use serde_json::Value;

/// How two attribute values are compared when computing the dirty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// Value and JSON type must both match.
    #[default]
    Strict,
    /// Type-juggling comparison, see [`loose_eq`].
    Loose,
}

impl Comparison {
    /// Map the `insensitive` flag used throughout the model API.
    pub fn from_insensitive(insensitive: bool) -> Self {
        if insensitive {
            Self::Loose
        } else {
            Self::Strict
        }
    }

    pub fn same(self, a: &Value, b: &Value) -> bool {
        match self {
            Self::Strict => a == b,
            Self::Loose => loose_eq(a, b),
        }
    }
}

/// Loose equality with scalar coercion.
///
/// - numeric strings compare numerically with numbers and with each other
/// - booleans compare against the other side's truthiness
/// - null equals `false`, `0`, `""` and `[]`, but not `"0"`
/// - arrays and objects compare element-wise, loosely
/// - anything else compares as text
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == truthy(other),
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        (Value::Null, other) | (other, Value::Null) => !truthy(other),
        (Value::Number(x), Value::Number(y)) => match (Number::of(x), Number::of(y)) {
            (Some(x), Some(y)) => x.same(y),
            _ => x == y,
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (Number::parse(s), Number::of(n)) {
                (Some(parsed), Some(n)) => parsed.same(n),
                _ => n.to_string() == *s,
            }
        }
        (Value::String(x), Value::String(y)) => match (Number::parse(x), Number::parse(y)) {
            (Some(x), Some(y)) => x.same(y),
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| loose_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| loose_eq(a, b)))
        }
        _ => false,
    }
}

/// Truthiness used when a boolean or null is compared with another value.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A numeric operand of a loose comparison.
///
/// Integers stay exact; only a mixed integer/float pair falls back to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn of(n: &serde_json::Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            Some(Self::Int(i128::from(i)))
        } else if let Some(u) = n.as_u64() {
            Some(Self::Int(i128::from(u)))
        } else {
            n.as_f64().map(Self::Float)
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Some(Self::Int(i128::from(i)));
        }
        if let Ok(u) = trimmed.parse::<u64>() {
            return Some(Self::Int(i128::from(u)));
        }
        numeric(s).map(Self::Float)
    }

    fn same(self, other: Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

/// Parse a numeric string, allowing surrounding whitespace.
pub fn numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}
