//! Startup flags passed on the command line as `--flag name[:value]`.
//!
//! The binary's argument parser turns each value into a [`ConfigFlag`].

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    /// The flag was given without a value
    Set,
    Value(String),
}

/// A single `name[:value]` flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFlag {
    pub name: String,
    pub value: FlagValue,
}

impl FromStr for ConfigFlag {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, EngineError> {
        let (name, value) = match s.split_once(':') {
            Some((name, value)) => (name, FlagValue::Value(value.to_string())),
            None => (s, FlagValue::Set),
        };
        if name.is_empty() {
            return Err(EngineError::invalid("flag", s));
        }
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Read-only flag mapping. Fixed once the engine is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    map: HashMap<String, FlagValue>,
}

impl Flags {
    /// Later flags with the same name replace earlier ones
    pub fn new(flags: impl IntoIterator<Item = ConfigFlag>) -> Self {
        Self {
            map: flags.into_iter().map(|f| (f.name, f.value)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.map.get(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// The value of a `name:value` flag
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.map.get(name) {
            Some(FlagValue::Value(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}
