//! Layer registry
//!
//! [`LayerRegistryBuilder`] collects feature layers, their metadata and aliases during
//! start-up. [`LayerRegistryBuilder::build`] freezes it into a [`LayerRegistry`] that is
//! only read afterwards and can be shared between threads.
//!
//! Every mutation comes in two flavours: `add_*` fails on any collision and leaves the
//! registry untouched, `set_*` silently overwrites.

use crate::error::{ConfigError, ConfigResult};
use crate::feature::FeatureName;
use crate::layer::ConfigurationLayer;
use crate::metadata::{FeatureConfiguration, OptionsMetadata};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Read-only mapping of features to their layers, metadata and aliases
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    /// Alias (including every canonical name) to canonical name
    aliases: HashMap<FeatureName, String>,
    metadata: HashMap<FeatureName, OptionsMetadata>,
    layers: HashMap<FeatureName, Arc<ConfigurationLayer>>,
    /// Canonical names in registration order
    feature_names: Vec<String>,
}

impl LayerRegistry {
    /// Start building a registry
    pub fn builder() -> LayerRegistryBuilder {
        LayerRegistryBuilder::new()
    }

    /// Canonical feature names in the order their layers were registered
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Every alias and canonical name mapped to its canonical name
    pub fn alias_mapping(&self) -> &HashMap<FeatureName, String> {
        &self.aliases
    }

    /// Canonical name to metadata
    pub fn metadata_mapping(&self) -> &HashMap<FeatureName, OptionsMetadata> {
        &self.metadata
    }

    /// Resolve an alias or canonical name, ignoring case
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.aliases
            .get(&FeatureName::from(name))
            .map(String::as_str)
    }

    /// Resolve every name in order, failing on the first unknown one
    pub fn canonicalize(&self, names: &[&str]) -> ConfigResult<Vec<String>> {
        names
            .iter()
            .map(|name| {
                self.canonical_name(name)
                    .map(str::to_owned)
                    .ok_or_else(|| ConfigError::UnknownFeature {
                        name: (*name).to_owned(),
                    })
            })
            .collect()
    }

    /// The layer registered under a canonical name
    pub fn layer(&self, feature_name: &str) -> Option<&Arc<ConfigurationLayer>> {
        self.layers.get(&FeatureName::from(feature_name))
    }

    /// The metadata registered under a canonical name
    pub fn metadata(&self, feature_name: &str) -> Option<&OptionsMetadata> {
        self.metadata.get(&FeatureName::from(feature_name))
    }

    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }
}

/// Mutable build phase of a [`LayerRegistry`]
#[derive(Debug, Default)]
pub struct LayerRegistryBuilder {
    registry: LayerRegistry,
}

impl LayerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `alias` to `feature_name`, failing if `alias` is already mapped to anything
    pub fn add_alias(
        &mut self,
        alias: impl Into<String>,
        feature_name: impl Into<String>,
    ) -> ConfigResult<&mut Self> {
        let alias = FeatureName::new(alias);
        let feature_name = feature_name.into();
        if self.registry.aliases.contains_key(&alias) {
            return Err(ConfigError::DuplicateRegistration {
                alias: alias.into_string(),
                feature: feature_name,
            });
        }
        self.registry.aliases.insert(alias, feature_name);
        Ok(self)
    }

    /// Map `alias` to `feature_name`, replacing any existing mapping
    pub fn set_alias(
        &mut self,
        alias: impl Into<String>,
        feature_name: impl Into<String>,
    ) -> &mut Self {
        self.registry
            .aliases
            .insert(FeatureName::new(alias), feature_name.into());
        self
    }

    /// Register a feature layer.
    ///
    /// Fails without registering anything if the canonical name or one of the aliases is
    /// already known, or if the canonical name already has a layer.
    pub fn add_configuration_source(
        &mut self,
        feature: FeatureConfiguration,
    ) -> ConfigResult<&mut Self> {
        let FeatureConfiguration { metadata, layer } = feature;
        let name = metadata.name.clone();
        if name.is_empty() {
            return Err(ConfigError::MissingFeatureName);
        }

        let key = FeatureName::new(name.as_str());
        let mut pending = HashSet::new();
        for alias in std::iter::once(&name).chain(metadata.aliases.iter()) {
            let alias_key = FeatureName::new(alias.as_str());
            if self.registry.aliases.contains_key(&alias_key) || !pending.insert(alias_key) {
                return Err(ConfigError::DuplicateRegistration {
                    alias: alias.clone(),
                    feature: name.clone(),
                });
            }
        }
        if self.registry.layers.contains_key(&key) {
            return Err(ConfigError::DuplicateLayer { feature: name });
        }

        for alias in pending {
            self.registry.aliases.insert(alias, name.clone());
        }
        self.insert_layer(key, metadata, layer);
        Ok(self)
    }

    /// Register a feature layer, overwriting any existing aliases, metadata and layer
    pub fn set_configuration_source(
        &mut self,
        feature: FeatureConfiguration,
    ) -> ConfigResult<&mut Self> {
        let FeatureConfiguration { metadata, layer } = feature;
        if metadata.name.is_empty() {
            return Err(ConfigError::MissingFeatureName);
        }

        let name = metadata.name.clone();
        self.set_alias(name.as_str(), name.as_str());
        for alias in &metadata.aliases {
            self.set_alias(alias.as_str(), name.as_str());
        }
        self.insert_layer(FeatureName::new(name), metadata, layer);
        Ok(self)
    }

    fn insert_layer(
        &mut self,
        key: FeatureName,
        metadata: OptionsMetadata,
        layer: ConfigurationLayer,
    ) {
        let name = metadata.name.clone();
        debug!(
            "Registering feature '{}' with {} aliases and {} keys",
            name,
            metadata.aliases.len(),
            layer.len()
        );

        let registry = &mut self.registry;
        match registry
            .feature_names
            .iter_mut()
            .find(|existing| FeatureName::from(existing.as_str()) == key)
        {
            Some(existing) => *existing = name,
            None => registry.feature_names.push(name),
        }
        // Remove first so the new spelling of the key is stored
        registry.layers.remove(&key);
        registry.layers.insert(key.clone(), Arc::new(layer));
        registry.metadata.remove(&key);
        registry.metadata.insert(key, metadata);
    }

    pub fn feature_names(&self) -> &[String] {
        self.registry.feature_names()
    }

    pub fn alias_mapping(&self) -> &HashMap<FeatureName, String> {
        self.registry.alias_mapping()
    }

    pub fn metadata_mapping(&self) -> &HashMap<FeatureName, OptionsMetadata> {
        self.registry.metadata_mapping()
    }

    /// Freeze the registry
    pub fn build(self) -> LayerRegistry {
        self.registry
    }
}
