//! Cached access to feature-layered options

use crate::cache::{CacheKey, OptionsCache, OptionsKey, SharedOptions, SourceId};
use crate::config::CachePolicy;
use crate::errors::{CacheError, CacheResult};
use overlay_config::{
    ConfigurationLayer, FeatureName, LayerRegistry, LayeredResolver, OptionsMetadata,
};
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A feature's metadata next to its full configuration
pub struct FeatureConfigurationView<T> {
    pub metadata: OptionsMetadata,
    pub configuration: Option<Arc<T>>,
}

impl<T> Clone for FeatureConfigurationView<T> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FeatureConfigurationView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureConfigurationView")
            .field("metadata", &self.metadata)
            .field("configuration", &self.configuration)
            .finish()
    }
}

/// Resolves options for feature lists and memoizes the results.
///
/// Feature names are mapped to their canonical names before the cache is consulted, so
/// alias and case differences share one entry while a different order gets its own.
/// Every caller asking for the same entry receives the same `Arc`.
#[derive(Debug, Clone)]
pub struct OptionsProvider {
    resolver: LayeredResolver,
    cache: OptionsCache,
    source: SourceId,
}

impl OptionsProvider {
    /// Create a provider with its own unbounded cache
    pub fn new(base: ConfigurationLayer, registry: LayerRegistry) -> Self {
        Self::with_cache(Arc::new(base), Arc::new(registry), OptionsCache::new())
    }

    /// Create a provider backed by an existing (possibly shared) cache.
    ///
    /// Providers sharing a cache keep separate entries. Clones of a provider share its
    /// entries.
    pub fn with_cache(
        base: Arc<ConfigurationLayer>,
        registry: Arc<LayerRegistry>,
        cache: OptionsCache,
    ) -> Self {
        let source = cache.register_source();
        Self {
            resolver: LayeredResolver::new(base, registry),
            cache,
            source,
        }
    }

    pub fn cache(&self) -> &OptionsCache {
        &self.cache
    }

    pub fn resolver(&self) -> &LayeredResolver {
        &self.resolver
    }

    /// Canonical feature names in registration order
    pub fn feature_names(&self) -> &[String] {
        self.resolver.registry().feature_names()
    }

    pub fn alias_mapping(&self) -> &HashMap<FeatureName, String> {
        self.resolver.registry().alias_mapping()
    }

    pub fn metadata_mapping(&self) -> &HashMap<FeatureName, OptionsMetadata> {
        self.resolver.registry().metadata_mapping()
    }

    /// Options at `key` for the given features, `None` if nothing defines the key.
    ///
    /// `policy` overrides the cache's default policy when this call creates the entry.
    pub fn get_options<T>(
        &self,
        key: &str,
        feature_names: &[&str],
        policy: Option<&CachePolicy>,
    ) -> CacheResult<Option<Arc<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.get(OptionsKey::Key(key.to_owned()), feature_names, policy)
    }

    /// The whole merged configuration for the given features
    pub fn get_all_options<T>(
        &self,
        feature_names: &[&str],
        policy: Option<&CachePolicy>,
    ) -> CacheResult<Option<Arc<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.get(OptionsKey::All, feature_names, policy)
    }

    /// Each feature's metadata and full configuration, in registration order
    pub fn get_all_configurations<T>(&self) -> CacheResult<Vec<FeatureConfigurationView<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let registry = self.resolver.registry();
        registry
            .feature_names()
            .iter()
            .map(|name| -> CacheResult<FeatureConfigurationView<T>> {
                let metadata = registry
                    .metadata(name)
                    .cloned()
                    .unwrap_or_else(|| OptionsMetadata::new(name.as_str()));
                let configuration = self.get_all_options::<T>(&[name.as_str()], None)?;
                Ok(FeatureConfigurationView {
                    metadata,
                    configuration,
                })
            })
            .collect()
    }

    fn get<T>(
        &self,
        options: OptionsKey,
        feature_names: &[&str],
        policy: Option<&CachePolicy>,
    ) -> CacheResult<Option<Arc<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        // Unknown names fail here, before anything can be cached
        let canonical = self.resolver.registry().canonicalize(feature_names)?;
        let cache_key = CacheKey::new::<T>(self.source, options.clone(), canonical.clone());

        let value = self.cache.get_or_compute(cache_key, policy, || {
            let resolved = self
                .resolver
                .resolve_canonical::<T>(options.as_key(), &canonical)?;
            Ok(resolved.map(|value| Arc::new(value) as SharedOptions))
        })?;

        value
            .map(|value| {
                value
                    .downcast::<T>()
                    .map_err(|_| CacheError::TypeMismatch(type_name::<T>()))
            })
            .transpose()
    }
}
