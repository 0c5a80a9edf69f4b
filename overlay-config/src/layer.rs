//! Flat key/value configuration layers
//!
//! A layer maps hierarchical keys (segments joined by [`KEY_DELIMITER`]) to raw string
//! values. A `None` value marks a key as explicitly removed so that it hides the value of
//! an earlier layer. Keys compare case-insensitively; the first spelling is kept.

use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Separator between the segments of a hierarchical key
pub const KEY_DELIMITER: &str = ":";

/// Separator used in environment variable names instead of [`KEY_DELIMITER`]
pub const ENV_KEY_DELIMITER: &str = "__";

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    key: String,
    value: Option<String>,
}

/// An immutable-once-registered flat configuration fragment.
///
/// Entries keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationLayer {
    entries: Vec<Entry>,
    // Lowercased key to position in `entries`
    index: HashMap<String, usize>,
}

impl ConfigurationLayer {
    /// Create an empty layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style [`remove`](Self::remove)
    pub fn without(mut self, key: impl Into<String>) -> Self {
        self.remove(key);
        self
    }

    /// Set a value for a key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), Some(value.into()));
    }

    /// Mark a key as explicitly absent
    pub fn remove(&mut self, key: impl Into<String>) {
        self.insert(key.into(), None);
    }

    fn insert(&mut self, key: String, value: Option<String>) {
        let folded = key.to_lowercase();
        match self.index.get(&folded) {
            Some(&position) => self.entries[position].value = value,
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push(Entry { key, value });
            }
        }
    }

    /// Look up a key. `Some(None)` means the key is present but explicitly absent.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.index
            .get(&key.to_lowercase())
            .map(|&position| self.entries[position].value.as_deref())
    }

    /// Number of keys, including removed ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layer has no keys at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_deref()))
    }

    /// Apply every key of `other` on top of this layer, last writer wins
    pub fn merge_from(&mut self, other: &ConfigurationLayer) {
        for entry in &other.entries {
            self.insert(entry.key.clone(), entry.value.clone());
        }
    }

    /// Flatten a structured value.
    ///
    /// Objects and arrays become key prefixes (array items use their index as the
    /// segment), strings are stored verbatim, `null` marks the key as removed and other
    /// scalars keep their JSON text. Empty objects and arrays contribute no keys.
    pub fn from_value(value: &Value) -> Self {
        let mut layer = Self::new();
        let mut prefix = String::new();
        layer.flatten_into(value, &mut prefix);
        layer
    }

    fn flatten_into(&mut self, value: &Value, prefix: &mut String) {
        match value {
            Value::Object(map) => {
                for (name, child) in map {
                    let len = prefix.len();
                    push_segment(prefix, name);
                    self.flatten_into(child, prefix);
                    prefix.truncate(len);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    let len = prefix.len();
                    push_segment(prefix, &index.to_string());
                    self.flatten_into(child, prefix);
                    prefix.truncate(len);
                }
            }
            // A bare scalar has no key to live under
            _ if prefix.is_empty() => {}
            Value::String(s) => self.set(prefix.clone(), s.clone()),
            Value::Null => self.remove(prefix.clone()),
            other => self.set(prefix.clone(), other.to_string()),
        }
    }

    /// Parse a JSON document into a layer
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        Ok(Self::from_value(&value))
    }

    /// Parse a YAML document into a layer
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: Value = serde_yaml::from_str(content)?;
        Ok(Self::from_value(&value))
    }

    /// Load a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match extension_of(path).as_deref() {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(ConfigError::ValidationError(format!(
                "unsupported configuration file type: {}",
                path.display()
            ))),
        }
    }

    /// Collect environment variables named `{prefix}__a__b` as the key `a:b`
    pub fn from_env(prefix: &str) -> Self {
        let marker = format!("{}{}", prefix, ENV_KEY_DELIMITER);
        let mut layer = Self::new();
        for (name, value) in std::env::vars_os() {
            let (Some(name), Some(value)) = (name.to_str(), value.to_str()) else {
                continue;
            };
            if let Some(rest) = name.strip_prefix(&marker) {
                if !rest.is_empty() {
                    layer.set(rest.replace(ENV_KEY_DELIMITER, KEY_DELIMITER), value);
                }
            }
        }
        layer
    }
}

/// Layers are equal when they hold the same spellings and values, in any order
impl PartialEq for ConfigurationLayer {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|entry| {
                other
                    .index
                    .get(&entry.key.to_lowercase())
                    .is_some_and(|&position| other.entries[position] == *entry)
            })
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for ConfigurationLayer
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut layer = Self::new();
        for (key, value) in iter {
            layer.insert(key.into(), value.map(Into::into));
        }
        layer
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn push_segment(prefix: &mut String, segment: &str) {
    if !prefix.is_empty() {
        prefix.push_str(KEY_DELIMITER);
    }
    prefix.push_str(segment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_value() {
        let layer = ConfigurationLayer::from_value(&json!({
            "config": {
                "array": ["item 1", "item 2"],
                "object": { "one": 1, "two": 2.5, "enabled": true, "gone": null },
                "empty": {}
            }
        }));

        assert_eq!(layer.get("config:array:0"), Some(Some("item 1")));
        assert_eq!(layer.get("config:array:1"), Some(Some("item 2")));
        assert_eq!(layer.get("config:object:one"), Some(Some("1")));
        assert_eq!(layer.get("config:object:two"), Some(Some("2.5")));
        assert_eq!(layer.get("config:object:enabled"), Some(Some("true")));
        assert_eq!(layer.get("config:object:gone"), Some(None));
        assert_eq!(layer.get("config:empty"), None);
        assert_eq!(layer.len(), 6);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut layer = ConfigurationLayer::new().with("Config:Name", "first");
        layer.set("CONFIG:NAME", "second");

        assert_eq!(layer.len(), 1);
        assert_eq!(layer.get("config:name"), Some(Some("second")));
        assert_eq!(layer.iter().next(), Some(("Config:Name", Some("second"))));
    }

    #[test]
    fn test_first_spelling_of_a_segment_is_stable() {
        let layer = ConfigurationLayer::new()
            .with("Config:a", "1")
            .with("config:b", "2")
            .with("CONFIG:c", "3");

        let keys: Vec<_> = layer.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["Config:a", "config:b", "CONFIG:c"]);

        let section = crate::section::Section::from_entries(layer.iter());
        let config = section.get("config").unwrap();
        assert_eq!(config.key(), "Config");
        assert_eq!(config.get("b").unwrap().path(), "Config:b");
    }

    #[test]
    fn test_equality_ignores_order() {
        let ab = ConfigurationLayer::new().with("a", "1").with("b", "2");
        let ba = ConfigurationLayer::new().with("b", "2").with("a", "1");
        assert_eq!(ab, ba);
        assert_ne!(ab, ConfigurationLayer::new().with("A", "1").with("b", "2"));
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let mut base = ConfigurationLayer::new()
            .with("a", "1")
            .with("b", "2");
        let overlay = ConfigurationLayer::new().with("b", "3").without("a").with("c", "4");

        base.merge_from(&overlay);

        assert_eq!(base.get("a"), Some(None));
        assert_eq!(base.get("b"), Some(Some("3")));
        assert_eq!(base.get("c"), Some(Some("4")));
    }

    #[test]
    fn test_from_yaml_str() {
        let layer = ConfigurationLayer::from_yaml_str(
            r#"
config:
  array:
    - "yaml item"
  object:
    one: 11
"#,
        )
        .unwrap();

        assert_eq!(layer.get("config:array:0"), Some(Some("yaml item")));
        assert_eq!(layer.get("config:object:one"), Some(Some("11")));
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "a = 1").unwrap();

        let err = ConfigurationLayer::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_from_iter_with_removed_keys() {
        let layer: ConfigurationLayer =
            [("a", Some("1")), ("b", None)].into_iter().collect();

        assert_eq!(layer.get("A"), Some(Some("1")));
        assert_eq!(layer.get("b"), Some(None));
    }
}
