use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A typed cell value.
///
/// Values serialize to natural JSON (`Int` as a number, `Map` as an object,
/// `Null` as `null`), which keeps durable table files and the edited-surface
/// cells in the same shape. Map entries keep their insertion order; object
/// keys serialize through [`Value::key_string`] because JSON object keys are
/// always strings.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent / empty cell.
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    List(Vec<Value>),
    /// Ordered key/value pairs; key type comes from the column definition.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Returns true if the value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Lenient integer view: floats truncate, booleans map to 0/1, text is
    /// parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(v) => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Lenient float view, mirroring [`Value::as_i64`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Lenient boolean view: numbers are true when non-zero, text compares
    /// case-insensitively against the accepted true tokens.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            Value::Text(s) => Some(is_true_token(s)),
            _ => None,
        }
    }

    /// The string form used for JSON object keys.
    pub fn key_string(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// The case-insensitive tokens accepted as `true` by boolean coercion;
/// anything else reads as `false`.
pub(crate) fn is_true_token(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("true") || s == "1" || s.eq_ignore_ascii_case("yes")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(v) => write!(f, "{v}"),
            list @ Value::List(_) => {
                f.write_str(&serde_json::to_string(list).map_err(|_| fmt::Error)?)
            }
            map @ Value::Map(_) => {
                f.write_str(&serde_json::to_string(map).map_err(|_| fmt::Error)?)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(&key.key_string(), value)?;
                }
                map.end()
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn serializes_to_natural_json() {
        let value = Value::Map(vec![
            (Value::Int(1), Value::Text("a".to_string())),
            (Value::Int(2), Value::List(vec![Value::Bool(true), Value::Null])),
        ]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"1":"a","2":[true,null]}"#
        );
    }

    #[test]
    fn lenient_numeric_views() {
        assert_eq!(Value::Float(2.9).as_i64(), Some(2));
        assert_eq!(Value::Text(" 42 ".to_string()).as_i64(), Some(42));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::List(vec![]).as_i64(), None);
    }

    #[test]
    fn bool_tokens() {
        assert_eq!(Value::Text("YES".to_string()).as_bool(), Some(true));
        assert_eq!(Value::Text("1".to_string()).as_bool(), Some(true));
        assert_eq!(Value::Text("no".to_string()).as_bool(), Some(false));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
    }
}
