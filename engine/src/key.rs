//! Keys and key extraction.
//!
//! A [`Key`] identifies an item within one query's result set. Keys are never
//! stored on items by the engine; they are derived on demand by a
//! [`KeyExtractor`] supplied by the caller.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an item: either a string or an integer.
///
/// Ordering puts all integer keys before all string keys, which keeps
/// iteration over ordered stores deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Parse a key from a JSON value, if it has a key-compatible type.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Key::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(Key::Int),
            _ => None,
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Key::Int(n) => serde_json::Value::from(*n),
            Key::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

/// Keys are coerced to their string form when addressing the remote source.
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

/// Derives the key of an item.
///
/// Implementations must be deterministic and free of side effects: the same
/// logical entity must map to the same key in every snapshot. Extraction may
/// fail; the error is propagated unchanged to whoever asked for the key.
pub trait KeyExtractor<T: ?Sized> {
    fn key_of(&self, item: &T) -> Result<Key>;
}

impl<T, F> KeyExtractor<T> for F
where
    T: ?Sized,
    F: Fn(&T) -> Result<Key>,
{
    fn key_of(&self, item: &T) -> Result<Key> {
        self(item)
    }
}

/// Extracts the key of a JSON object from one of its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    field: String,
}

impl FieldKey {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl KeyExtractor<serde_json::Value> for FieldKey {
    fn key_of(&self, item: &serde_json::Value) -> Result<Key> {
        let value = item
            .get(&self.field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::MissingKey(self.field.clone()))?;

        Key::from_json(value).ok_or_else(|| Error::InvalidKey {
            field: self.field.clone(),
            got: json_type_name(value).to_string(),
        })
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
