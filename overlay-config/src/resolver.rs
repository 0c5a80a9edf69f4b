//! Layered resolution
//!
//! The effective configuration for a feature list is the base layer followed by each
//! feature's layer in the order given, later values winning. Only keys below the
//! requested key take part in the merge.

use crate::binding::from_section;
use crate::error::{ConfigError, ConfigResult};
use crate::layer::ConfigurationLayer;
use crate::registry::LayerRegistry;
use crate::section::{is_within, Section};
use log::trace;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Merges feature layers over a base configuration and binds the result.
///
/// The resolver never caches. Wrap it in a cache when results are read repeatedly.
#[derive(Debug, Clone)]
pub struct LayeredResolver {
    base: Arc<ConfigurationLayer>,
    registry: Arc<LayerRegistry>,
}

impl LayeredResolver {
    pub fn new(base: Arc<ConfigurationLayer>, registry: Arc<LayerRegistry>) -> Self {
        Self { base, registry }
    }

    pub fn base(&self) -> &ConfigurationLayer {
        &self.base
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Resolve `key` (or the whole tree when `None`) for features given by alias or name.
    ///
    /// Fails with [`ConfigError::UnknownFeature`] on the first name that is not
    /// registered. A key that no layer defines resolves to `Ok(None)`.
    pub fn resolve<T: DeserializeOwned>(
        &self,
        key: Option<&str>,
        feature_names: &[&str],
    ) -> ConfigResult<Option<T>> {
        let canonical = self.registry.canonicalize(feature_names)?;
        self.resolve_canonical(key, &canonical)
    }

    /// Like [`resolve`](Self::resolve) for names already mapped to canonical form
    pub fn resolve_canonical<T: DeserializeOwned>(
        &self,
        key: Option<&str>,
        canonical_names: &[String],
    ) -> ConfigResult<Option<T>> {
        let Some(section) = self.section(key, canonical_names)? else {
            return Ok(None);
        };
        from_section(section)
            .map(Some)
            .map_err(|e| ConfigError::Bind {
                key: key.unwrap_or("<root>").to_owned(),
                message: e.to_string(),
            })
    }

    /// The merged section at `key`, or `None` when nothing defines it
    pub fn section(
        &self,
        key: Option<&str>,
        canonical_names: &[String],
    ) -> ConfigResult<Option<Section>> {
        trace!("Resolving {:?} for features {:?}", key, canonical_names);

        let mut layers = Vec::with_capacity(canonical_names.len() + 1);
        layers.push(self.base.as_ref());
        for name in canonical_names {
            let layer = self
                .registry
                .layer(name)
                .ok_or_else(|| ConfigError::UnknownFeature { name: name.clone() })?;
            layers.push(layer.as_ref());
        }

        let prefix = key.unwrap_or_default();
        let entries = layers
            .into_iter()
            .flat_map(ConfigurationLayer::iter)
            .filter(|(entry_key, _)| is_within(entry_key, prefix));

        Ok(Section::from_entries(entries)
            .into_child(prefix)
            .filter(|section| !section.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FeatureConfiguration, OptionsMetadata};
    use std::collections::HashMap;

    fn resolver() -> LayeredResolver {
        let base = ConfigurationLayer::new()
            .with("config:name", "base")
            .with("config:level", "1")
            .with("other", "untouched");

        let mut builder = LayerRegistry::builder();
        builder
            .add_configuration_source(FeatureConfiguration::new(
                OptionsMetadata::new("a").with_aliases(["alpha"]),
                ConfigurationLayer::new().with("config:name", "from a"),
            ))
            .unwrap()
            .add_configuration_source(FeatureConfiguration::new(
                OptionsMetadata::new("b"),
                ConfigurationLayer::new()
                    .with("config:name", "from b")
                    .without("config:level"),
            ))
            .unwrap();

        LayeredResolver::new(Arc::new(base), Arc::new(builder.build()))
    }

    #[test]
    fn test_no_features_reads_base() {
        let value: Option<String> = resolver().resolve(Some("config:name"), &[]).unwrap();
        assert_eq!(value.as_deref(), Some("base"));
    }

    #[test]
    fn test_last_feature_wins() {
        let resolver = resolver();
        let ab: Option<String> = resolver.resolve(Some("CONFIG:Name"), &["a", "b"]).unwrap();
        let ba: Option<String> = resolver.resolve(Some("config:name"), &["B", "alpha"]).unwrap();
        assert_eq!(ab.as_deref(), Some("from b"));
        assert_eq!(ba.as_deref(), Some("from a"));
    }

    #[test]
    fn test_removed_key_hides_base_value() {
        let config: HashMap<String, Option<String>> =
            resolver().resolve(Some("config"), &["b"]).unwrap().unwrap();
        assert_eq!(config["name"].as_deref(), Some("from b"));
        assert_eq!(config["level"], None);

        let level: Option<u32> = resolver().resolve(Some("config:level"), &["b"]).unwrap();
        assert_eq!(level, None);
    }

    #[test]
    fn test_missing_key_is_none() {
        let value: Option<String> = resolver().resolve(Some("nope"), &["a"]).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_unknown_feature() {
        let err = resolver()
            .resolve::<String>(Some("config:name"), &["a", "missing"])
            .unwrap_err();
        assert!(err.is_unknown_feature());
        assert_eq!(
            err.to_string(),
            "The given feature name \"missing\" is not a known feature."
        );
    }

    #[test]
    fn test_whole_tree() {
        let all: HashMap<String, serde_json::Value> =
            resolver().resolve(None, &["a"]).unwrap().unwrap();
        assert_eq!(all["other"], "untouched");
        assert_eq!(all["config"]["name"], "from a");
    }

    #[test]
    fn test_bind_error_names_key() {
        let err = resolver()
            .resolve::<u32>(Some("config:name"), &[])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Bind { ref key, .. } if key == "config:name"));
    }
}
