//! Column value representation
//!
//! This module provides the scalar values stored in record columns.

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::cmp::Ordering;
use serde::{Serialize, Deserialize};

use crate::error::{StoreError, Result};
use crate::tuple::compare_values;

/// Largest magnitude below which integral numbers are written as JSON integers
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Value in a column
///
/// Serialized untagged, so a record round-trips through plain JSON scalars.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    Null,

    /// Boolean
    Boolean(bool),

    /// Floating point (64-bit)
    Number(f64),

    /// Text string
    Text(String),
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Number(v) => write!(f, "Number({})", v),
            Value::Text(v) => {
                if v.chars().count() > 20 {
                    let head: String = v.chars().take(20).collect();
                    write!(f, "Text(\"{}...\")", head)
                } else {
                    write!(f, "Text(\"{}\")", v)
                }
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Number(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Equal exactly when the index order ranks the two values the same
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        compare_values(self, other) == Ordering::Equal
    }
}

impl Value {
    /// Numeric view of the value; booleans encode as 0 and 1
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of the value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON scalar into a value
    ///
    /// Arrays and objects are rejected: columns only hold scalars.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(v) => Ok(Value::Boolean(v)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| StoreError::InvalidRecord(format!("Number {} is not representable", n))),
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            other => Err(StoreError::InvalidRecord(format!(
                "Column values must be scalars, got {}",
                other
            ))),
        }
    }

    /// Convert the value into a JSON scalar
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(v) => serde_json::Value::Bool(*v),
            Value::Number(v) if v.fract() == 0.0 && v.abs() < MAX_SAFE_INTEGER => {
                serde_json::Value::Number(serde_json::Number::from(*v as i64))
            }
            Value::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(v) => serde_json::Value::String(v.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_numeric_view() {
        assert_eq!(Value::Boolean(false).as_number(), Some(0.0));
        assert_eq!(Value::Boolean(true).as_number(), Some(1.0));
        assert_eq!(Value::Text("1".to_string()).as_number(), None);
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!("wow");
        assert_eq!(Value::from_json(json).unwrap(), Value::from("wow"));

        let json = serde_json::json!(42);
        assert_eq!(Value::from_json(json.clone()).unwrap(), Value::Number(42.0));
        assert_eq!(Value::Number(42.0).to_json(), json);

        // Nested values are not column values
        assert!(Value::from_json(serde_json::json!([1, 2])).is_err());
        assert!(Value::from_json(serde_json::json!({"a": 1})).is_err());

        // Untagged serialization keeps plain scalars
        let encoded = serde_json::to_string(&Value::Boolean(true)).unwrap();
        assert_eq!(encoded, "true");
        let decoded: Value = serde_json::from_str("null").unwrap();
        assert_eq!(decoded, Value::Null);
    }

    #[test]
    fn test_equality_follows_order() {
        let pairs = [
            (Value::Number(f64::NAN), Value::Number(f64::NAN)),
            (Value::Boolean(true), Value::Number(1.0)),
            (Value::Boolean(false), Value::Number(-0.0)),
            (Value::Number(-0.0), Value::Number(0.0)),
        ];

        for (a, b) in &pairs {
            assert_eq!(a, b);
            assert_eq!(compare_values(a, b), Ordering::Equal);
        }

        assert_ne!(Value::Number(1.0), Value::from("1"));
        assert_ne!(Value::Null, Value::Boolean(false));
    }
}
