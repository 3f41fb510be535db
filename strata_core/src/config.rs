//! Configuration values and option maps.
//!
//! Node options arrive from a TOML file and from command-line overrides. They
//! are collected into an [`OptionMap`] and handed explicitly to whatever needs
//! them; there is no process-global configuration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A configuration value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Null value.
    Null,

    /// Boolean value.
    Boolean(bool),

    /// Integer value.
    Integer(i64),

    /// Float value.
    Float(f64),

    /// String value.
    String(String),

    /// Array value.
    Array(Vec<ConfigValue>),

    /// Table value.
    Table(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get this value as a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get this value as a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array.
    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Table(_) => "table",
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => Self::Integer(i),
            Err(_) => Self::String(value.to_string()),
        }
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        Self::Array(value)
    }
}

impl From<toml::Value> for ConfigValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s),
            toml::Value::Integer(i) => Self::Integer(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Boolean(b),
            toml::Value::Datetime(d) => Self::String(d.to_string()),
            toml::Value::Array(a) => Self::Array(a.into_iter().map(Self::from).collect()),
            toml::Value::Table(t) => {
                Self::Table(t.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::String(s) => write!(f, "{}", s),
            Self::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Self::Table(t) => {
                write!(f, "{{")?;
                for (i, (k, v)) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Read access to application options by name.
///
/// Consumers such as the pruning resolver only need lookups, so they take
/// `&dyn AppOptions` and stay independent of where the values came from.
pub trait AppOptions {
    /// Get the raw value for an option, if present.
    fn get(&self, key: &str) -> Option<&ConfigValue>;

    /// Get an option as a string.
    ///
    /// Returns `Ok(None)` when the option is absent.
    fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(ConfigValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected string, found {}", other.type_name()),
            }),
        }
    }

    /// Get an option as an unsigned integer.
    ///
    /// Integers and decimal strings are accepted. An empty string reads as
    /// absent. Negative or non-numeric values are errors, never zero.
    fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            reason,
        };

        match self.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(ConfigValue::Integer(i)) => u64::try_from(*i)
                .map(Some)
                .map_err(|_| invalid(format!("{} is negative", i))),
            Some(ConfigValue::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|e| invalid(format!("{:?}: {}", s, e)))
            }
            Some(other) => Err(invalid(format!(
                "expected unsigned integer, found {}",
                other.type_name()
            ))),
        }
    }
}

/// A flat map of option names to values.
///
/// Nested TOML tables are flattened into dotted keys, so `[store] name = "x"`
/// is reachable as `store.name`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionMap {
    values: HashMap<String, ConfigValue>,
}

impl OptionMap {
    /// Create an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = input
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mut map = Self::new();
        for (key, value) in table {
            map.insert_flattened(key, ConfigValue::from(value));
        }
        Ok(map)
    }

    /// Load options from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlay another map on top of this one. Values in `other` win.
    pub fn merge(&mut self, other: OptionMap) {
        self.values.extend(other.values);
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no options.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert_flattened(&mut self, key: String, value: ConfigValue) {
        match value {
            ConfigValue::Table(table) => {
                for (k, v) in table {
                    self.insert_flattened(format!("{}.{}", key, k), v);
                }
            }
            other => {
                self.values.insert(key, other);
            }
        }
    }
}

impl AppOptions for OptionMap {
    fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }
}
