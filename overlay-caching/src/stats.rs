//! Cache statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that reached the cache (after feature names were resolved)
    pub lookups: u64,

    /// Lookups answered by an existing or in-flight entry
    pub hits: u64,

    /// Lookups that ran the resolver, including ones that failed
    pub computations: u64,

    /// Entries dropped because of capacity, not counting expirations
    pub evictions: u64,

    /// Current number of entries
    pub entry_count: u64,

    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
}

/// Thread-safe statistics collector
#[derive(Debug, Default)]
pub struct StatsCollector {
    lookups: AtomicU64,
    hits: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that computed its value
    pub fn record_computation(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current stats
    pub fn get_stats(&self, entry_count: u64) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);

        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            lookups,
            hits,
            computations: self.computations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count,
            hit_rate,
        }
    }
}

/// Shared stats collector
pub type SharedStatsCollector = Arc<StatsCollector>;

/// Create a new shared stats collector
pub fn create_stats_collector() -> SharedStatsCollector {
    Arc::new(StatsCollector::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = StatsCollector::new();
        assert_eq!(stats.get_stats(0).hit_rate, 0.0);

        stats.record_computation();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_eviction();

        let snapshot = stats.get_stats(1);
        assert_eq!(snapshot.lookups, 4);
        assert_eq!(snapshot.computations, 1);
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.hit_rate, 0.75);
    }
}
