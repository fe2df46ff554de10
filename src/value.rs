use indexmap::IndexMap;
use std::cmp::Ordering;

/// A JSON value used throughout the Sorrel query language.
///
/// This type represents all valid JSON types. Numbers are stored as `f64`,
/// matching JSON's single number type; objects remember insertion order so
/// that constructed objects, `keys()` and `values()` observe declared order.
///
/// # Examples
///
/// ```
/// use sorrel_lang::Value;
/// use indexmap::IndexMap;
///
/// // Scalar values
/// let null = Value::Null;
/// let boolean = Value::Bool(true);
/// let number = Value::Number(3.14);
/// let string = Value::String("hello".to_string());
///
/// // Collections
/// let array = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
///
/// let mut obj = IndexMap::new();
/// obj.insert("key".to_string(), Value::String("value".to_string()));
/// let object = Value::Object(obj);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null
    Null,

    /// JSON boolean (true/false)
    Bool(bool),

    /// JSON number (double precision)
    Number(f64),

    /// UTF-8 string
    String(String),

    /// Array of values (homogeneous or heterogeneous)
    Array(Vec<Value>),

    /// Object with string keys, in insertion order
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Check if the value is truthy (for `filter`, `if`, `and`, `or`, `not`).
    ///
    /// Truthy means: not null, not `false`, and not the number 0. Empty
    /// strings, arrays and objects count as truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }

    /// Get as float, if numeric
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice, if a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Ordering between two values.
    ///
    /// Defined only between two numbers or two strings. Mixed or composite
    /// types (and `NaN` against anything) compare as `None`: comparison
    /// operators treat that as false, `sort` treats it as equal.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert a `serde_json::Value` into a Sorrel value
    pub fn from_json(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a Sorrel value into a `serde_json::Value`.
    ///
    /// Non-finite numbers have no JSON representation and become null.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(Value::to_json_value).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

#[test]
fn test_object_equality_ignores_key_order() {
    let a = Value::from_json(serde_json::json!({"x": 1, "y": 2}));
    let b = Value::from_json(serde_json::json!({"y": 2, "x": 1}));
    assert_eq!(a, b);
}

#[test]
fn test_json_round_trip_preserves_key_order() {
    // Float literals on purpose: numbers come back as f64-backed JSON
    let source = serde_json::json!({"b": [1.5, {"x": null}], "a": true});
    let value = Value::from_json(source.clone());
    assert_eq!(value.to_json_value(), source);
}

#[test]
fn test_nan_equals_nothing() {
    let nan = Value::Number(f64::NAN);
    assert_ne!(nan, Value::Number(f64::NAN));
    assert_eq!(nan.compare(&Value::Number(1.0)), None);
}
