//! Typed key/value metadata attached to an exposure.
//!
//! Mirrors a FITS-style header: insertion order is kept and a key may appear
//! more than once. Lookups that need a single answer go through
//! [`Metadata::find_unique`], which treats duplicates as an error.

use std::fmt;

use thiserror::Error;

/// A metadata value with an explicit kind tag.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataValue::Int(_) => "int",
            MetadataValue::Float(_) => "float",
            MetadataValue::Str(_) => "string",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Str(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Int(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

/// Errors from unique and typed metadata lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("key '{key}' not found")]
    NotFound { key: String },

    #[error("key '{key}' has {count} entries, expected exactly one")]
    Ambiguous { key: String, count: usize },

    #[error("key '{key}' holds a {actual} value, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Append an entry. Existing entries with the same key are kept.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn find_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MetadataValue> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn find_unique(&self, key: &str) -> Result<&MetadataValue, MetadataError> {
        let mut matches = self
            .entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v);
        let first = matches.next().ok_or_else(|| MetadataError::NotFound {
            key: key.to_string(),
        })?;
        let extra = matches.count();
        if extra > 0 {
            return Err(MetadataError::Ambiguous {
                key: key.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    pub fn get_int(&self, key: &str) -> Result<i64, MetadataError> {
        let value = self.find_unique(key)?;
        value.as_int().ok_or_else(|| MetadataError::WrongType {
            key: key.to_string(),
            expected: "int",
            actual: value.kind(),
        })
    }

    pub fn get_str(&self, key: &str) -> Result<&str, MetadataError> {
        let value = self.find_unique(key)?;
        value.as_str().ok_or_else(|| MetadataError::WrongType {
            key: key.to_string(),
            expected: "string",
            actual: value.kind(),
        })
    }
}
