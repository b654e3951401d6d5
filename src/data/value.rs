use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Value – a single cell of a datapoint
// ---------------------------------------------------------------------------

/// A dynamically-typed scalar carried by a [`Datapoint`](super::model::Datapoint).
///
/// Equality and ordering are total (`NaN == NaN`) so values can live in
/// `BTreeSet`s and be compared after a CSV round-trip.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    /// Any float, including NaN and ±infinity.
    Float(f64),
    String(String),
    /// An explicit `null` read from a source file.
    Null,
}

impl Value {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Guess the type of a text cell: int, float, bool, else string.
    /// Empty cells have no value.
    pub fn guess(s: &str) -> Option<Value> {
        if s.is_empty() {
            return None;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Some(Value::Int(i));
        }
        if let Ok(f) = s.parse::<f64>() {
            return Some(Value::Float(f));
        }
        if s == "true" || s == "false" {
            return Some(Value::Bool(s == "true"));
        }
        Some(Value::String(s.to_string()))
    }

    /// Parse a log token: float if it parses as one, string otherwise.
    pub fn float_or_string(s: &str) -> Value {
        match s.parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::String(s.to_string()),
        }
    }

    /// Projection used on the wire. Non-finite floats are not representable
    /// in JSON: infinities become `"inf"` / `"-inf"` and NaN becomes `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) if f.is_nan() => JsonValue::Null,
            Value::Float(f) if f.is_infinite() => {
                JsonValue::String(if *f > 0.0 { "inf" } else { "-inf" }.to_string())
            }
            Value::Float(f) => JsonValue::from(*f),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Null => JsonValue::Null,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(val: &JsonValue) -> Self {
        match val {
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::String(n.to_string())
                }
            }
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Null => Value::Null,
            other => Value::String(other.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let da = self.discriminant();
        let db = other.discriminant();
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Every NaN (any sign, any payload) sorts as one value, above `+inf`.
fn canonical(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN.copysign(1.0)
    } else {
        f
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) if f.is_nan() => u64::MAX.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

/// Canonical text form, used for CSV cells and uid coercion.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Ok(Value::from(&json))
    }
}
