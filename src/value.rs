//! Binding values and row records.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A row as seen by callers: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, Json>;

/// Dynamic value type for positional bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Convert to the JSON form used in rows.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
        }
    }

    /// Loose equality against a row cell. Numbers compare by value, so `1` matches `1.0`.
    pub fn matches(&self, cell: &Json) -> bool {
        match (self, cell) {
            (Value::Null, Json::Null) => true,
            (Value::Bool(a), Json::Bool(b)) => a == b,
            (Value::Int(a), Json::Number(n)) => match n.as_i64() {
                Some(b) => *a == b,
                None => n.as_f64() == Some(*a as f64),
            },
            (Value::Float(a), Json::Number(n)) => n.as_f64() == Some(*a),
            (Value::String(a), Json::String(b)) => a == b,
            _ => false,
        }
    }

    /// Numeric view, used by increment and decrement on virtual rows.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<&Json> for Value {
    fn from(v: &Json) -> Self {
        match v {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::String(s.clone()),
            // Nested documents are bound as their JSON text.
            other => Value::String(other.to_string()),
        }
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::from(&v)
    }
}

/// Build a [`Row`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty row.
pub fn row(value: Json) -> Row {
    match value {
        Json::Object(map) => map,
        _ => Row::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_from() {
        let _b: Value = true.into();
        let _i: Value = 42i32.into();
        let _f: Value = 3.14f64.into();
        let _s: Value = "hello".into();
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_matches_numeric_coercion() {
        assert!(Value::Int(1).matches(&json!(1)));
        assert!(Value::Int(1).matches(&json!(1.0)));
        assert!(!Value::Int(1).matches(&json!("1")));
        assert!(Value::from("a").matches(&json!("a")));
    }

    #[test]
    fn test_from_json_object_binds_text() {
        let v = Value::from(json!({"a": 1}));
        assert_eq!(v, Value::String("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_row_preserves_order() {
        let r = row(json!({"b": 1, "a": 2}));
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
