//! Memoization of resolved options
//!
//! Entries are keyed by the source they were resolved from, the lookup key, the canonical
//! feature list in request order and the requested type. A miss runs the computation exactly once per key; concurrent
//! callers for the same key wait for it and receive the same `Arc`. Failed computations
//! are never stored.

use crate::config::{CacheConfig, CachePolicy};
use crate::errors::{CacheError, CacheResult};
use crate::stats::{create_stats_collector, CacheStats, SharedStatsCollector};
use chrono::Utc;
use log::{debug, trace};
use moka::notification::RemovalCause;
use moka::sync::Cache as MokaInner;
use moka::Expiry;
use overlay_config::ConfigResult;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A type-erased resolved value
pub type SharedOptions = Arc<dyn Any + Send + Sync>;

/// What a cache entry was resolved for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionsKey {
    /// A single key, compared exactly
    Key(String),
    /// The whole configuration tree
    All,
}

impl OptionsKey {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            OptionsKey::Key(key) => Some(key),
            OptionsKey::All => None,
        }
    }
}

/// Identifies one base and registry pair among the users of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

/// Composite cache key.
///
/// Two requests share an entry only when they come from the same source and ask for the
/// same key and type with the same canonical features in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: SourceId,
    options: OptionsKey,
    features: Vec<String>,
    type_id: TypeId,
}

impl CacheKey {
    pub fn new<T: 'static>(source: SourceId, options: OptionsKey, features: Vec<String>) -> Self {
        Self {
            source,
            options,
            features,
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn options(&self) -> &OptionsKey {
        &self.options
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }
}

#[derive(Clone)]
struct CachedOptions {
    value: Option<SharedOptions>,
    policy: CachePolicy,
}

/// Forwards each entry's [`CachePolicy`] to moka
struct PolicyExpiry;

impl Expiry<CacheKey, CachedOptions> for PolicyExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedOptions,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.policy.time_to_live(Utc::now())
    }
}

/// Shared, thread-safe store of resolved options.
///
/// Clones share the same entries, so one cache can back several providers. Each provider
/// takes its own [`SourceId`] and only ever sees the entries resolved under it.
#[derive(Clone)]
pub struct OptionsCache {
    inner: MokaInner<CacheKey, CachedOptions>,
    next_source: Arc<AtomicU64>,
    stats: Option<SharedStatsCollector>,
    default_policy: CachePolicy,
}

impl OptionsCache {
    /// Create an unbounded cache whose entries never expire
    pub fn new() -> Self {
        Self::build(&CacheConfig::default())
    }

    /// Create a cache from configuration
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        config
            .validate()
            .map_err(CacheError::InvalidConfiguration)?;
        Ok(Self::build(config))
    }

    fn build(config: &CacheConfig) -> Self {
        let stats = config.collect_stats.then(create_stats_collector);
        let listener_stats = stats.clone();

        let mut builder = MokaInner::builder()
            .expire_after(PolicyExpiry)
            .eviction_listener(move |key: Arc<CacheKey>, _value, cause: RemovalCause| {
                if matches!(cause, RemovalCause::Size) {
                    debug!("Evicted options {:?} ({:?})", key.options(), cause);
                    if let Some(stats) = &listener_stats {
                        stats.record_eviction();
                    }
                }
            });
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            inner: builder.build(),
            next_source: Arc::new(AtomicU64::new(0)),
            stats,
            default_policy: config.default_policy.clone(),
        }
    }

    /// Reserve a source id that no other user of this cache holds
    pub fn register_source(&self) -> SourceId {
        SourceId(self.next_source.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the entry for `key`, running `compute` if there is none.
    ///
    /// `policy` applies only when this call computes the entry.
    pub fn get_or_compute<F>(
        &self,
        key: CacheKey,
        policy: Option<&CachePolicy>,
        compute: F,
    ) -> CacheResult<Option<SharedOptions>>
    where
        F: FnOnce() -> ConfigResult<Option<SharedOptions>>,
    {
        let policy = policy.unwrap_or(&self.default_policy).clone();
        let mut computed = false;
        let options = key.options().clone();

        let entry = self.inner.try_get_with(key, || {
            computed = true;
            debug!("Computing options {:?}", options);
            compute().map(|value| CachedOptions { value, policy })
        });

        // Failed computations count too, their result is just not kept
        if let Some(stats) = &self.stats {
            if computed {
                stats.record_computation();
            } else {
                trace!("Cache hit for options {:?}", options);
                stats.record_hit();
            }
        }
        Ok(entry?.value)
    }

    /// Snapshot of the statistics, all zero when collection is disabled
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        let entry_count = self.inner.entry_count();
        match &self.stats {
            Some(stats) => stats.get_stats(entry_count),
            None => CacheStats {
                entry_count,
                ..Default::default()
            },
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }
}

impl Default for OptionsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OptionsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsCache")
            .field("entry_count", &self.inner.entry_count())
            .field("default_policy", &self.default_policy)
            .finish()
    }
}
