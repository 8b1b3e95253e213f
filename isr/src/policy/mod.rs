//! Hierarchical, typed pipeline policy.
//!
//! A policy is a tree of named values; nested sections are reached with
//! dotted paths (`"flatPolicy.stretchFactor"`). Every typed getter fails
//! with a [`PolicyError`] naming the full path instead of falling back to a
//! default, so an incomplete policy is caught before any pixel is touched.
//!
//! ```rust,ignore
//! let isr_policy = Policy::from_file("policies/isr_policy.yaml")?;
//! let stretch = isr_policy.get_double("flatPolicy.stretchFactor")?;
//! ```


use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use common::file_format::FileFormat;

/// A single policy value.
///
/// Deserialization tries the variants in order, so `1` is an `Int`, `1.0`
/// is a `Float` and a mapping becomes a `Section`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PolicyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Section(Policy),
}

impl PolicyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyValue::Bool(_) => "bool",
            PolicyValue::Int(_) => "int",
            PolicyValue::Float(_) => "double",
            PolicyValue::Str(_) => "string",
            PolicyValue::Section(_) => "section",
        }
    }
}

impl From<bool> for PolicyValue {
    fn from(value: bool) -> Self {
        PolicyValue::Bool(value)
    }
}

impl From<i64> for PolicyValue {
    fn from(value: i64) -> Self {
        PolicyValue::Int(value)
    }
}

impl From<f64> for PolicyValue {
    fn from(value: f64) -> Self {
        PolicyValue::Float(value)
    }
}

impl From<&str> for PolicyValue {
    fn from(value: &str) -> Self {
        PolicyValue::Str(value.to_string())
    }
}

impl From<Policy> for PolicyValue {
    fn from(value: Policy) -> Self {
        PolicyValue::Section(value)
    }
}

/// Errors from typed policy lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy key '{key}' not found")]
    Missing { key: String },

    #[error("policy key '{key}' is a {actual}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("policy key '{key}' has an invalid value: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Policy {
    entries: BTreeMap<String, PolicyValue>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy file; the format (YAML, JSON, TOML) follows the extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        common::serde::read_file(path.as_ref())
    }

    pub fn parse(text: &str, format: FileFormat) -> anyhow::Result<Self> {
        common::serde::deserialize(text, format)
    }

    /// Builder-style insert of a top-level entry.
    pub fn with(mut self, key: &str, value: impl Into<PolicyValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<PolicyValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Resolve a dotted path.
    pub fn get(&self, path: &str) -> Result<&PolicyValue, PolicyError> {
        let mut section = self;
        let mut segments = path.split('.');
        let mut segment = segments.next().unwrap_or_default();
        let mut end = 0;
        loop {
            end += segment.len();
            let value = section
                .entries
                .get(segment)
                .ok_or_else(|| PolicyError::Missing {
                    key: path[..end].to_string(),
                })?;

            let Some(next) = segments.next() else {
                return Ok(value);
            };

            section = match value {
                PolicyValue::Section(inner) => inner,
                other => {
                    return Err(PolicyError::WrongType {
                        key: path[..end].to_string(),
                        expected: "section",
                        actual: other.kind(),
                    })
                }
            };
            end += 1;
            segment = next;
        }
    }

    pub fn get_policy(&self, path: &str) -> Result<&Policy, PolicyError> {
        match self.get(path)? {
            PolicyValue::Section(section) => Ok(section),
            other => Err(wrong_type(path, "section", other)),
        }
    }

    pub fn get_string(&self, path: &str) -> Result<&str, PolicyError> {
        match self.get(path)? {
            PolicyValue::Str(value) => Ok(value),
            other => Err(wrong_type(path, "string", other)),
        }
    }

    /// Integers are accepted and widened.
    pub fn get_double(&self, path: &str) -> Result<f64, PolicyError> {
        match self.get(path)? {
            PolicyValue::Float(value) => Ok(*value),
            PolicyValue::Int(value) => Ok(*value as f64),
            other => Err(wrong_type(path, "double", other)),
        }
    }

    /// Like [`Policy::get_double`], but a missing key yields `None`.
    pub fn get_optional_double(&self, path: &str) -> Result<Option<f64>, PolicyError> {
        match self.get_double(path) {
            Ok(value) => Ok(Some(value)),
            Err(PolicyError::Missing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_bool(&self, path: &str) -> Result<bool, PolicyError> {
        match self.get(path)? {
            PolicyValue::Bool(value) => Ok(*value),
            other => Err(wrong_type(path, "bool", other)),
        }
    }
}

fn wrong_type(path: &str, expected: &'static str, actual: &PolicyValue) -> PolicyError {
    PolicyError::WrongType {
        key: path.to_string(),
        expected,
        actual: actual.kind(),
    }
}
