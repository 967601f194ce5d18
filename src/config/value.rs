//! Typed configuration values and fragments

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// One option value: a string, an ordered string list, or a nested table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    List(Vec<String>),
    Table(BTreeMap<String, ConfigValue>),
}

/// Shape of a value, used in conflict reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    List,
    Table,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Table => "table",
        };
        f.write_str(name)
    }
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::List(_) => ValueKind::List,
            ConfigValue::Table(_) => ValueKind::Table,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Convert a TOML value. Numbers and booleans become strings;
    /// arrays must hold scalars.
    pub fn from_toml(value: toml::Value) -> Result<Self, String> {
        match value {
            toml::Value::Table(table) => {
                let mut map = BTreeMap::new();
                for (k, v) in table {
                    let converted = Self::from_toml(v).map_err(|e| format!("{}: {}", k, e))?;
                    map.insert(k, converted);
                }
                Ok(ConfigValue::Table(map))
            }
            toml::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    match toml_scalar(item) {
                        Some(s) => list.push(s),
                        None => return Err(format!("[{}]: array items must be scalars", i)),
                    }
                }
                Ok(ConfigValue::List(list))
            }
            other => toml_scalar(other)
                .map(ConfigValue::String)
                .ok_or_else(|| "datetime values are not supported".to_string()),
        }
    }
}

fn toml_scalar(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
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

impl From<Vec<String>> for ConfigValue {
    fn from(items: Vec<String>) -> Self {
        ConfigValue::List(items)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(items: Vec<&str>) -> Self {
        ConfigValue::List(items.into_iter().map(str::to_string).collect())
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValue {
    fn from(table: BTreeMap<String, ConfigValue>) -> Self {
        ConfigValue::Table(table)
    }
}

/// One configuration layer: option name to value, sorted by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFragment(BTreeMap<String, ConfigValue>);

impl ConfigFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Option<ConfigValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ConfigValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn entry(&mut self, key: String) -> btree_map::Entry<'_, String, ConfigValue> {
        self.0.entry(key)
    }

    /// Convert a TOML table, reporting the offending key on failure
    pub fn from_toml_table(table: toml::value::Table) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        for (k, v) in table {
            let converted = ConfigValue::from_toml(v).map_err(|e| format!("{}: {}", k, e))?;
            map.insert(k, converted);
        }
        Ok(Self(map))
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigFragment {
    fn from(map: BTreeMap<String, ConfigValue>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigFragment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for ConfigFragment {
    type Item = (String, ConfigValue);
    type IntoIter = btree_map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigFragment {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = btree_map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ConfigValue::from("x").kind(), ValueKind::String);
        assert_eq!(ConfigValue::from(vec!["a", "b"]).kind(), ValueKind::List);
        assert_eq!(ConfigValue::Table(BTreeMap::new()).kind(), ValueKind::Table);
    }

    #[test]
    fn test_from_toml_scalars() {
        let v = ConfigValue::from_toml(toml::Value::Integer(3)).unwrap();
        assert_eq!(v, ConfigValue::from("3"));
        let v = ConfigValue::from_toml(toml::Value::Boolean(true)).unwrap();
        assert_eq!(v, ConfigValue::from("true"));
    }

    #[test]
    fn test_from_toml_nested_array_rejected() {
        let value: toml::Value = toml::from_str::<toml::Table>("x = [[1], [2]]")
            .unwrap()
            .remove("x")
            .unwrap();
        let err = ConfigValue::from_toml(value).unwrap_err();
        assert!(err.contains("[0]"));
    }

    #[test]
    fn test_fragment_serializes_sorted() {
        let frag = ConfigFragment::new()
            .with("skip", "pp*")
            .with("before-all", "yum install -y openblas-devel");
        let json = serde_json::to_string(&frag).unwrap();
        assert_eq!(
            json,
            r#"{"before-all":"yum install -y openblas-devel","skip":"pp*"}"#
        );
    }

    #[test]
    fn test_untagged_deserialize() {
        let frag: ConfigFragment = serde_json::from_str(
            r#"{"skip": ["pp*"], "test-command": "pytest", "environment": {"A": "1"}}"#,
        )
        .unwrap();
        assert_eq!(frag.get("skip").unwrap().kind(), ValueKind::List);
        assert_eq!(frag.get("test-command").unwrap().as_str(), Some("pytest"));
        assert_eq!(frag.get("environment").unwrap().kind(), ValueKind::Table);
    }
}
