//! Feature metadata

use crate::layer::ConfigurationLayer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive information about a feature's group of options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsMetadata {
    /// Canonical name. Loaders derive it from the file path relative to the root.
    pub name: String,

    /// Alternative names that resolve to `name`
    pub aliases: Vec<String>,

    /// Creators or maintainers, e.g. emails separated by ";"
    pub owners: String,

    /// After this date the options might stop being supported
    #[serde(
        with = "crate::utils::serde_date_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub best_before_date: Option<DateTime<Utc>>,

    /// Expected to be supported for a long time
    pub is_persistent: bool,

    /// Free-form payload, not interpreted here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OptionsMetadata {
    /// Metadata with only a canonical name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_owners(mut self, owners: impl Into<String>) -> Self {
        self.owners = owners.into();
        self
    }

    /// Whether the best-before date has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.best_before_date.is_some_and(|date| now > date)
    }
}

/// A feature's metadata paired with its configuration layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureConfiguration {
    pub metadata: OptionsMetadata,
    pub layer: ConfigurationLayer,
}

impl FeatureConfiguration {
    pub fn new(metadata: OptionsMetadata, layer: ConfigurationLayer) -> Self {
        Self { metadata, layer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metadata_from_json() {
        let metadata: OptionsMetadata = serde_json::from_str(
            r#"{
                "aliases": ["sub_example"],
                "owners": "a@example.com;b@example.com",
                "bestBeforeDate": "2030-01-31",
                "isPersistent": true,
                "details": { "ticket": 42 }
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.name, "");
        assert_eq!(metadata.aliases, vec!["sub_example"]);
        assert!(metadata.is_persistent);
        assert_eq!(
            metadata.best_before_date,
            Some(Utc.with_ymd_and_hms(2030, 1, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(metadata.details.unwrap()["ticket"], 42);
    }

    #[test]
    fn test_metadata_accepts_timestamp() {
        let metadata: OptionsMetadata =
            serde_yaml::from_str("bestBeforeDate: \"2030-01-31T12:30:00+02:00\"").unwrap();

        assert_eq!(
            metadata.best_before_date,
            Some(Utc.with_ymd_and_hms(2030, 1, 31, 10, 30, 0).unwrap())
        );
        assert!(metadata.is_expired_at(Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap()));
        assert!(!metadata.is_expired_at(Utc.with_ymd_and_hms(2029, 1, 1, 0, 0, 0).unwrap()));
    }
}
