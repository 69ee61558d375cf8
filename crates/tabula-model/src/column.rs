use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::error::{CoercionError, SchemaError};
use crate::value::{is_true_token, Value};

/// Declared type of a table column.
///
/// The textual form is the one used in durable table files and in the edited
/// surface's type row: `int`, `float`, `string`, `bool`, `List<T>`,
/// `Dictionary<K, V>`. List elements and dictionary keys/values are
/// primitive types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    String,
    Bool,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int => f.write_str("int"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::String => f.write_str("string"),
            ColumnType::Bool => f.write_str("bool"),
            ColumnType::List(elem) => write!(f, "List<{elem}>"),
            ColumnType::Map(key, value) => write!(f, "Dictionary<{key}, {value}>"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "int" => return Ok(ColumnType::Int),
            "float" => return Ok(ColumnType::Float),
            "string" => return Ok(ColumnType::String),
            "bool" => return Ok(ColumnType::Bool),
            _ => {}
        }
        if let Some(inner) = s.strip_prefix("List<").and_then(|r| r.strip_suffix('>')) {
            return Ok(ColumnType::List(Box::new(inner.parse()?)));
        }
        if let Some(inner) = s.strip_prefix("Dictionary<").and_then(|r| r.strip_suffix('>')) {
            let (key, value) = split_type_pair(inner).ok_or_else(|| SchemaError::UnknownType {
                token: s.to_string(),
            })?;
            return Ok(ColumnType::Map(
                Box::new(key.parse()?),
                Box::new(value.parse()?),
            ));
        }
        Err(SchemaError::UnknownType {
            token: s.to_string(),
        })
    }
}

/// Split `K, V` at the top-level comma, tolerating nested angle brackets.
fn split_type_pair(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in s.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((&s[..idx], &s[idx + 1..])),
            _ => {}
        }
    }
    None
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Definition of one table column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Free-form description shown in editing surfaces.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Default value for new rows, kept in its raw JSON shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            default: None,
        }
    }

    /// Convert a raw JSON-shaped cell into this column's typed value.
    ///
    /// Absent input (`null`) and the empty string coerce to [`Value::Null`].
    /// Numeric and structured parsing failures are a [`CoercionError`];
    /// scalar inputs that merely have the wrong shape fall back leniently
    /// (single-element wrapping for lists, the empty map for dictionaries).
    pub fn coerce(&self, raw: &Json) -> Result<Value, CoercionError> {
        coerce_value(&self.ty, raw, &self.name)
    }
}

fn coerce_value(ty: &ColumnType, raw: &Json, column: &str) -> Result<Value, CoercionError> {
    match raw {
        Json::Null => return Ok(Value::Null),
        Json::String(s) if s.is_empty() => return Ok(Value::Null),
        _ => {}
    }
    let err = || CoercionError::new(column, raw, ty);
    match ty {
        ColumnType::Int => match raw {
            Json::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::Int)
                .ok_or_else(err),
            Json::Bool(b) => Ok(Value::Int(*b as i64)),
            Json::String(s) => s.trim().parse().map(Value::Int).map_err(|_| err()),
            _ => Err(err()),
        },
        ColumnType::Float => match raw {
            Json::Number(n) => n.as_f64().map(Value::Float).ok_or_else(err),
            Json::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            Json::String(s) => s.trim().parse().map(Value::Float).map_err(|_| err()),
            _ => Err(err()),
        },
        ColumnType::String => Ok(Value::Text(match raw {
            Json::String(s) => s.clone(),
            Json::Bool(b) => b.to_string(),
            Json::Number(n) => n.to_string(),
            other => serde_json::to_string(other).map_err(|_| err())?,
        })),
        ColumnType::Bool => Ok(Value::Bool(match raw {
            Json::Bool(b) => *b,
            Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Json::String(s) => is_true_token(s),
            _ => false,
        })),
        ColumnType::List(elem) => match raw {
            Json::Array(items) => coerce_list(elem, items, column),
            Json::String(s) => {
                let parsed: Json = serde_json::from_str(s).map_err(|_| err())?;
                match parsed {
                    Json::Array(items) => coerce_list(elem, &items, column),
                    scalar => Ok(Value::List(vec![coerce_value(elem, &scalar, column)?])),
                }
            }
            scalar => Ok(Value::List(vec![coerce_value(elem, scalar, column)?])),
        },
        ColumnType::Map(key_ty, value_ty) => match raw {
            Json::Object(entries) => coerce_map(key_ty, value_ty, entries, column),
            Json::String(s) => {
                let parsed: Json = serde_json::from_str(s).map_err(|_| err())?;
                match parsed {
                    Json::Object(entries) => coerce_map(key_ty, value_ty, &entries, column),
                    _ => Ok(Value::Map(Vec::new())),
                }
            }
            _ => Ok(Value::Map(Vec::new())),
        },
    }
}

fn coerce_list(elem: &ColumnType, items: &[Json], column: &str) -> Result<Value, CoercionError> {
    items
        .iter()
        .map(|item| coerce_value(elem, item, column))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn coerce_map(
    key_ty: &ColumnType,
    value_ty: &ColumnType,
    entries: &serde_json::Map<String, Json>,
    column: &str,
) -> Result<Value, CoercionError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let key = coerce_value(key_ty, &Json::String(key.clone()), column)?;
        let value = coerce_value(value_ty, value, column)?;
        pairs.push((key, value));
    }
    Ok(Value::Map(pairs))
}
