//! Loosely-typed key/value bag used as activation input.
use std::fmt;

use crate::value::Value;

/// Read access to named values.
pub trait PropertyProvider {
    fn try_get_property(&self, key: &str) -> Option<Value>;

    fn has_property(&self, key: &str) -> bool {
        self.try_get_property(key).is_some()
    }
}

/// Ordered property bag with case-insensitive keys. Setting an existing key
/// replaces its value in place, keeping the original position.
#[derive(Clone, Default)]
pub struct Properties {
    entries: Vec<(String, Value)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts a JSON object. Scalars become text so that the text conversion
    /// layer decides their final type; nested objects become nested bags and
    /// arrays become `Vec<Value>`.
    pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut props = Properties::new();
        for (k, v) in map {
            if let Some(v) = json_to_value(v) {
                props.set(k.clone(), v);
            }
        }
        props
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

pub(crate) fn json_to_value(v: &serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;
    match v {
        Json::Null => None,
        Json::Bool(b) => Some(Value::text(b.to_string())),
        Json::Number(n) => Some(Value::text(n.to_string())),
        Json::String(s) => Some(Value::text(s.clone())),
        Json::Array(items) => Some(Value::new(
            items.iter().filter_map(json_to_value).collect::<Vec<Value>>(),
        )),
        Json::Object(map) => Some(Value::new(Properties::from_json(map))),
    }
}

impl PropertyProvider for Properties {
    fn try_get_property(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

impl PropertyProvider for serde_json::Map<String, serde_json::Value> {
    fn try_get_property(&self, key: &str) -> Option<Value> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| json_to_value(v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
