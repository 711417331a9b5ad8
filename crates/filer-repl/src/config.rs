//! Sectioned key-value configuration.
//!
//! The replication config file is a nested TOML (or JSON) document. It is
//! flattened into dotted keys such as `sink.local.directory`, and plugins
//! receive the sub-section under their own prefix via [`Config::sub`].
//! Keys are case-insensitive: they are lowercased on insertion and lookup.

use crate::error::{ReplError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name searched for when no explicit config path is given.
pub const DEFAULT_CONFIG_NAME: &str = "replication.toml";

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form string.
    String(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(n) => write!(f, "{}", n),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Integer(n)
    }
}

impl From<f64> for ConfigValue {
    fn from(x: f64) -> Self {
        ConfigValue::Float(x)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

/// Flattened, case-insensitive configuration store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, ConfigValue>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file, choosing the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => Self::from_toml_str(&contents),
            "json" => Self::from_json_str(&contents),
            _ => Err(ReplError::config(format!(
                "unsupported config file extension: {:?}",
                ext
            ))),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(contents)?;
        let mut config = Self::new();
        flatten_toml("", &table, &mut config)?;
        Ok(config)
    }

    /// Parse a JSON document whose root is an object.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        let serde_json::Value::Object(map) = value else {
            return Err(ReplError::config("JSON config root must be an object"));
        };
        let mut config = Self::new();
        flatten_json("", &map, &mut config)?;
        Ok(config)
    }

    /// Resolve the config file to load.
    ///
    /// An explicit path must exist. Otherwise [`DEFAULT_CONFIG_NAME`] is
    /// looked up in the current directory, `$HOME/.seaweedfs` and
    /// `/etc/seaweedfs`, in that order.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(ReplError::config(format!(
                "config file {} not found",
                path.display()
            )));
        }

        let candidates = search_dirs();
        for dir in &candidates {
            let path = dir.join(DEFAULT_CONFIG_NAME);
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(ReplError::config(format!(
            "{} not found in {:?}; run `filer-replicate scaffold` to generate one",
            DEFAULT_CONFIG_NAME, candidates
        )))
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    /// Builder-style [`Config::set`].
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(&key.to_lowercase())
    }

    /// True if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Boolean lookup. Missing keys read as false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(ConfigValue::Bool(b)) => *b,
            Some(ConfigValue::Integer(n)) => *n != 0,
            Some(ConfigValue::String(s)) => {
                matches!(s.to_lowercase().as_str(), "true" | "t" | "1" | "yes" | "on")
            }
            _ => false,
        }
    }

    /// String lookup. Missing keys read as the empty string.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).map(|v| v.to_string()).unwrap_or_default()
    }

    /// Unsigned integer lookup, falling back to `default` when missing.
    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfigValue::Integer(n)) if *n >= 0 => Ok(*n as u64),
            Some(ConfigValue::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| ReplError::config(format!("{}: {:?} is not a number", key, s))),
            Some(other) => Err(ReplError::config(format!(
                "{}: {} is not an unsigned integer",
                key, other
            ))),
        }
    }

    /// The section under `prefix`, with the prefix stripped from its keys.
    pub fn sub(&self, prefix: &str) -> Config {
        let needle = format!("{}.", prefix.to_lowercase());
        let values = self
            .values
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&needle).map(|rest| (rest.to_string(), v.clone())))
            .collect();
        Config { values }
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// True if no values are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join(".seaweedfs"));
    }
    dirs.push(PathBuf::from("/etc/seaweedfs"));
    dirs
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn flatten_toml(prefix: &str, table: &toml::Table, out: &mut Config) -> Result<()> {
    for (key, value) in table {
        let path = join_key(prefix, key);
        match value {
            toml::Value::Table(inner) => flatten_toml(&path, inner, out)?,
            toml::Value::Boolean(b) => out.set(&path, *b),
            toml::Value::Integer(n) => out.set(&path, *n),
            toml::Value::Float(x) => out.set(&path, *x),
            toml::Value::String(s) => out.set(&path, s.as_str()),
            toml::Value::Datetime(d) => out.set(&path, d.to_string()),
            toml::Value::Array(_) => {
                return Err(ReplError::config(format!("{}: arrays are not supported", path)))
            }
        }
    }
    Ok(())
}

fn flatten_json(
    prefix: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    out: &mut Config,
) -> Result<()> {
    for (key, value) in map {
        let path = join_key(prefix, key);
        match value {
            serde_json::Value::Object(inner) => flatten_json(&path, inner, out)?,
            serde_json::Value::Null => {}
            serde_json::Value::Bool(b) => out.set(&path, *b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => out.set(&path, i),
                None => out.set(&path, n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => out.set(&path, s.as_str()),
            serde_json::Value::Array(_) => {
                return Err(ReplError::config(format!("{}: arrays are not supported", path)))
            }
        }
    }
    Ok(())
}
