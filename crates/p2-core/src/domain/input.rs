//! Input data: the caller-supplied key/value layer of the render context.

use std::{fmt, path::Path, str::FromStr};

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::DomainError;

/// Structured input data, keyed by string.
///
/// Keys iterate in sorted order. Later layers override earlier ones via
/// [`InputData::overlay`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InputData(Map<String, Value>);

impl InputData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build input data from a decoded document.
    ///
    /// An empty document (`null`) yields empty data; anything other than a
    /// mapping is rejected.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(DomainError::InvalidInputShape {
                found: kind_name(&other).into(),
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Merge `other` on top of `self`; keys present in both take `other`'s value.
    pub fn overlay(&mut self, other: InputData) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Pretty JSON dump, used for `--debug`.
    pub fn to_pretty_json(&self) -> String {
        // A Map<String, Value> always serializes.
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for InputData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// `true` when `key` is a usable variable name (`[A-Za-z0-9_]+`).
///
/// Process environment entries failing this check (e.g. exported shell
/// functions) are dropped before they reach a template.
pub fn is_identifier(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Encodings input data can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// `KEY=value` lines with shell-quoted values.
    Env,
    Json,
    Yaml,
}

impl DataFormat {
    /// Guess the format from a file extension (`.env`, `.json`, `.yaml`, `.yml`).
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for DataFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(DomainError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "env"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}
