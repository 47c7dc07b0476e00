//! Bind parameters and captured column values.
//!
//! `SqlValue` is what the host hands to the database alongside a statement.
//! `FieldValue` is what ends up in the `before` / `after` maps of a comment
//! payload. Binary values serialize as `{"type": "binary", "value": <base64>}`
//! so the JSON document survives arbitrary bytes.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Ordered column → value map. Column order follows the statement text.
pub type FieldMap = IndexMap<String, FieldValue>;

/// A positional bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// True for values that render as bare numeric literals in SQL text.
    ///
    /// Text counts when it looks like a number (`"42"`, `"-3.5"`, `"1e3"`),
    /// matching how loosely-typed hosts pass numeric binds as strings.
    pub fn is_numeric(&self) -> bool {
        match self {
            SqlValue::Integer(_) | SqlValue::Real(_) => true,
            SqlValue::Text(s) => looks_numeric(s),
            SqlValue::Null | SqlValue::Blob(_) => false,
        }
    }
}

fn looks_numeric(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty()
        && t.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && t.parse::<f64>().is_ok_and(f64::is_finite)
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) => write!(f, "{r}"),
            SqlValue::Text(s) => write!(f, "{s}"),
            SqlValue::Blob(b) => write!(f, "X'{}'", hex::encode_upper(b)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(r: f64) -> Self {
        SqlValue::Real(r)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(b: Vec<u8>) -> Self {
        SqlValue::Blob(b)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Real(r) => serializer.serialize_f64(*r),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(b) => binary_json(b).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SqlValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(b))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlValue::Integer(i)),
                None => n
                    .as_f64()
                    .map(SqlValue::Real)
                    .ok_or_else(|| de::Error::custom("unrepresentable number")),
            },
            Value::String(s) => Ok(SqlValue::Text(s)),
            other => decode_binary(&other)
                .map(SqlValue::Blob)
                .ok_or_else(|| de::Error::custom("expected scalar or binary bind value")),
        }
    }
}

/// A column value captured in a before/after image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Text(String),
    Binary(Vec<u8>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// The textual form, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Binary(b) => binary_json(b).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::String(s) => Ok(FieldValue::Text(s)),
            Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::Text(if b { "1" } else { "0" }.to_string())),
            other => decode_binary(&other)
                .map(FieldValue::Binary)
                .ok_or_else(|| de::Error::custom("expected scalar or binary field value")),
        }
    }
}

fn binary_json(bytes: &[u8]) -> Value {
    json!({ "type": "binary", "value": BASE64.encode(bytes) })
}

fn decode_binary(value: &Value) -> Option<Vec<u8>> {
    if value.get("type")?.as_str()? != "binary" {
        return None;
    }
    BASE64.decode(value.get("value")?.as_str()?).ok()
}

/// One result row, columns in select order.
pub type Row = IndexMap<String, SqlValue>;
