//! Slot substitution for long configurable strings
//!
//! A template such as `"{{greeting}} {{name}}"` is expanded by replacing each slot whose
//! key has a value. Values may contain further slots, which are expanded in turn. Slots
//! without a value, or whose value is `None`, stay in the output verbatim.

use crate::error::{ConfigError, ConfigResult};
use once_cell::sync::OnceCell;
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_START_DELIMITER: &str = "{{";
pub const DEFAULT_END_DELIMITER: &str = "}}";

/// Upper bound on scan rounds for one expansion
pub const MAX_EXPANSION_ITERATIONS: usize = 10_000;

/// Expand every resolvable slot in `template`.
///
/// After a replacement the scan restarts from the beginning of the string, so slots
/// introduced by a value are expanded too. After a slot that cannot be replaced the scan
/// moves forward by a single character, which keeps overlapping start delimiters such as
/// `{{{key}}` discoverable.
pub fn expand(
    template: &str,
    start_delimiter: &str,
    end_delimiter: &str,
    values: &HashMap<String, Option<String>>,
) -> ConfigResult<String> {
    if start_delimiter.is_empty() || end_delimiter.is_empty() {
        return Err(ConfigError::InvalidDelimiter);
    }

    let mut result = template.to_owned();
    let mut cursor = 0;
    for _ in 0..MAX_EXPANSION_ITERATIONS {
        let Some(offset) = result[cursor..].find(start_delimiter) else {
            return Ok(result);
        };
        let slot_start = cursor + offset;
        let key_start = slot_start + start_delimiter.len();
        let Some(key_len) = result[key_start..].find(end_delimiter) else {
            return Ok(result);
        };
        let key_end = key_start + key_len;

        match values.get(&result[key_start..key_end]) {
            Some(Some(value)) => {
                let value = value.clone();
                result.replace_range(slot_start..key_end + end_delimiter.len(), &value);
                cursor = 0;
            }
            _ => {
                let skipped = result[slot_start..].chars().next().map_or(1, char::len_utf8);
                cursor = slot_start + skipped;
            }
        }
    }

    Err(ConfigError::TemplateExpansionOverflow {
        max_iterations: MAX_EXPANSION_ITERATIONS,
    })
}

/// A template with its slot values, expanded on first access.
///
/// Deserializes from a plain string (a template without values) or from a section with
/// `template`, `values`, `startDelimiter` and `endDelimiter` keys.
#[derive(Debug, Clone)]
pub struct ConfigurableString {
    template: Option<String>,
    values: Option<HashMap<String, Option<String>>>,
    start_delimiter: String,
    end_delimiter: String,
    value: OnceCell<Option<String>>,
}

impl Default for ConfigurableString {
    fn default() -> Self {
        Self {
            template: None,
            values: None,
            start_delimiter: DEFAULT_START_DELIMITER.to_owned(),
            end_delimiter: DEFAULT_END_DELIMITER.to_owned(),
            value: OnceCell::new(),
        }
    }
}

impl ConfigurableString {
    pub fn new(template: Option<String>, values: Option<HashMap<String, Option<String>>>) -> Self {
        Self {
            template,
            values,
            ..Default::default()
        }
    }

    /// A template without values, which expands to itself
    pub fn from_template(template: impl Into<String>) -> Self {
        Self::new(Some(template.into()), None)
    }

    pub fn with_values(mut self, values: HashMap<String, Option<String>>) -> Self {
        self.values = Some(values);
        self.value = OnceCell::new();
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Some(value.into()));
        self.value = OnceCell::new();
        self
    }

    /// Declare `key` without a value so its slot is left as written
    pub fn with_tombstone(mut self, key: impl Into<String>) -> Self {
        self.values
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), None);
        self.value = OnceCell::new();
        self
    }

    pub fn with_delimiters(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_delimiter = start.into();
        self.end_delimiter = end.into();
        self.value = OnceCell::new();
        self
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn values(&self) -> Option<&HashMap<String, Option<String>>> {
        self.values.as_ref()
    }

    pub fn start_delimiter(&self) -> &str {
        &self.start_delimiter
    }

    pub fn end_delimiter(&self) -> &str {
        &self.end_delimiter
    }

    /// The expanded string, computed once and then reused.
    ///
    /// A failed expansion is not remembered, so calling again retries it.
    pub fn value(&self) -> ConfigResult<Option<&str>> {
        self.value
            .get_or_try_init(|| self.build())
            .map(Option::as_deref)
    }

    fn build(&self) -> ConfigResult<Option<String>> {
        let Some(template) = &self.template else {
            return Ok(None);
        };
        match &self.values {
            Some(values) => expand(template, &self.start_delimiter, &self.end_delimiter, values).map(Some),
            None => Ok(Some(template.clone())),
        }
    }
}

impl PartialEq for ConfigurableString {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
            && self.values == other.values
            && self.start_delimiter == other.start_delimiter
            && self.end_delimiter == other.end_delimiter
    }
}

impl From<String> for ConfigurableString {
    fn from(template: String) -> Self {
        Self::from_template(template)
    }
}

impl From<&str> for ConfigurableString {
    fn from(template: &str) -> Self {
        Self::from_template(template)
    }
}

impl<'de> Deserialize<'de> for ConfigurableString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ConfigurableStringVisitor)
    }
}

struct ConfigurableStringVisitor;

impl<'de> Visitor<'de> for ConfigurableStringVisitor {
    type Value = ConfigurableString;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a template string or a map with a template and values")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ConfigurableString::from_template(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(ConfigurableString::from_template(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ConfigurableString::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ConfigurableString::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        ConfigurableString::deserialize(deserializer)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut result = ConfigurableString::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.to_ascii_lowercase().as_str() {
                "template" => result.template = map.next_value()?,
                "values" => result.values = map.next_value()?,
                "startdelimiter" => {
                    if let Some(start) = map.next_value::<Option<String>>()? {
                        result.start_delimiter = start;
                    }
                }
                "enddelimiter" => {
                    if let Some(end) = map.next_value::<Option<String>>()? {
                        result.end_delimiter = end;
                    }
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> HashMap<String, Option<String>> {
        HashMap::from([
            ("1".to_string(), Some("Hello".to_string())),
            ("2".to_string(), Some("World".to_string())),
            ("1 and 2".to_string(), Some("{{1}} {{2}}".to_string())),
        ])
    }

    fn expand_default(template: &str) -> String {
        expand(
            template,
            DEFAULT_START_DELIMITER,
            DEFAULT_END_DELIMITER,
            &values(),
        )
        .unwrap()
    }

    #[test]
    fn test_expand() {
        let cases = [
            ("", ""),
            ("Hello World", "Hello World"),
            ("{{1}} {{2}}", "Hello World"),
            ("{{1}} {{2}} {{3}}", "Hello World {{3}}"),
            ("{{3}} {{1}} {{2}}", "{{3}} Hello World"),
            ("{{1 and 2}}", "Hello World"),
            ("{{1 and 2}} {{1 and 2}}", "Hello World Hello World"),
            ("|{{1 and 2}}| {{1}", "|Hello World| {{1}"),
            ("{{1}}}", "Hello}"),
            ("{{{1}}}", "{Hello}"),
            ("{{missing}} {{2}}", "{{missing}} World"),
            ("ünï {{1}} çødé", "ünï Hello çødé"),
        ];
        for (template, expected) in cases {
            assert_eq!(expand_default(template), expected, "template {template:?}");
        }
    }

    #[test]
    fn test_custom_delimiters() {
        let expanded = expand("|1| |2|", "|", "|", &values()).unwrap();
        assert_eq!(expanded, "Hello World");

        let value = ConfigurableString::from_template("<%1%>, <%2%>!")
            .with_values(values())
            .with_delimiters("<%", "%>");
        assert_eq!(value.value().unwrap(), Some("Hello, World!"));
    }

    #[test]
    fn test_recursive_loop_overflows() {
        let values = HashMap::from([
            ("1".to_string(), Some("{{2}}".to_string())),
            ("2".to_string(), Some("{{1}}".to_string())),
        ]);
        let err = expand("{{1}} {{2}}", "{{", "}}", &values).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TemplateExpansionOverflow { max_iterations: 10_000 }
        ));
        assert_eq!(
            err.to_string(),
            "The replacement loop count exceeded the maximum allowed iterations (10000). \
             There was likely a recursive loop using the template and values."
        );
    }

    #[test]
    fn test_tombstone_differs_from_empty_value() {
        let tombstoned = ConfigurableString::from_template("a{{k}}b").with_tombstone("k");
        let emptied = ConfigurableString::from_template("a{{k}}b").with_value("k", "");

        assert_eq!(tombstoned.value().unwrap(), Some("a{{k}}b"));
        assert_eq!(emptied.value().unwrap(), Some("ab"));
    }

    #[test]
    fn test_delimiter_value_is_rescanned() {
        let value = ConfigurableString::from_template("{{open}}1}}")
            .with_value("open", "{{")
            .with_value("1", "Hello");
        assert_eq!(value.value().unwrap(), Some("Hello"));
    }

    #[test]
    fn test_missing_template_and_values() {
        assert_eq!(ConfigurableString::default().value().unwrap(), None);
        let plain = ConfigurableString::from("{{1}}");
        assert_eq!(plain.value().unwrap(), Some("{{1}}"));
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let value = ConfigurableString::from_template("x").with_value("1", "y").with_delimiters("", "}");
        assert!(matches!(value.value(), Err(ConfigError::InvalidDelimiter)));
    }

    #[test]
    fn test_value_is_memoized() {
        let value = ConfigurableString::from_template("{{1}}").with_values(values());
        let first = value.value().unwrap().unwrap();
        let second = value.value().unwrap().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_deserialize_from_string_or_map() {
        let plain: ConfigurableString = serde_json::from_str(r#""just text""#).unwrap();
        assert_eq!(plain.value().unwrap(), Some("just text"));

        let templated: ConfigurableString = serde_json::from_str(
            r#"{
                "Template": "[[a]]-{{a}}",
                "values": { "a": "x", "b": null },
                "startDelimiter": "[[",
                "EndDelimiter": "]]"
            }"#,
        )
        .unwrap();
        assert_eq!(templated.values().unwrap()["b"], None);
        assert_eq!(templated.value().unwrap(), Some("x-{{a}}"));
    }
}
