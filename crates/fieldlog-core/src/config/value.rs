//! Document value used for both configuration trees.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

/// One node of a configuration tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// An empty map node.
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Builder-style insert; no-op on anything but a map.
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        if let Self::Map(entries) = &mut self {
            entries.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(value) => Some(value),
            Self::Int(value) => Some(value != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(value) => Some(value),
            Self::Bool(value) => Some(value as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(value) => Some(value),
            Self::Int(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Child of a map by key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Child of a list by position.
    pub fn at(&self, index: usize) -> Option<&ConfigValue> {
        match self {
            Self::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Walk a `/`-separated path of map keys and list indices, e.g. `"analog_config/inputs/0/low"`.
    ///
    /// Numeric segments index lists and are looked up as keys in maps.
    pub fn lookup(&self, path: &str) -> Option<&ConfigValue> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| match node {
                Self::List(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                Self::Map(entries) => entries.get(segment),
                _ => None,
            })
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_lookup_walks_maps_and_lists() {
        let tree = ConfigValue::map().with(
            "inputs",
            vec![
                ConfigValue::map().with("low", 1.5),
                ConfigValue::map().with("low", -2i64),
            ],
        );

        assert_eq!(tree.lookup("inputs/0/low"), Some(&ConfigValue::Float(1.5)));
        assert_eq!(tree.lookup("inputs/1/low").and_then(ConfigValue::as_f64), Some(-2.0));
        assert_eq!(tree.lookup("inputs/2/low"), None);
        assert_eq!(tree.lookup("inputs/x"), None);
        assert_eq!(tree.lookup(""), Some(&tree));
    }

    #[test]
    fn test_scalar_coercions() {
        assert_eq!(ConfigValue::Int(1).as_bool(), Some(true));
        assert_eq!(ConfigValue::Bool(true).as_i64(), Some(1));
        assert_eq!(ConfigValue::Float(0.5).as_i64(), None);
        assert_eq!(ConfigValue::from("abc").as_str(), Some("abc"));
    }

    #[test]
    fn test_postcard_round_trip() {
        let tree = ConfigValue::map()
            .with("general", ConfigValue::map().with("latency_time", 10i64))
            .with("key", "00FF");

        let bytes = postcard::to_allocvec(&tree).unwrap();
        let restored: ConfigValue = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(restored, tree);
    }
}
