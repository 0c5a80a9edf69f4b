//! Cache configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached option sets, unbounded when `None`
    pub max_capacity: Option<u64>,

    /// Policy for calls that do not pass one
    pub default_policy: CachePolicy,

    /// Enable cache statistics collection
    pub collect_stats: bool,
}

/// When a cached option set expires
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep until evicted by capacity
    #[default]
    Never,

    /// Hand the result to the caller but do not keep it
    Immediately,

    /// Expire a fixed time after insertion (seconds in configuration files)
    AfterDuration(#[serde(with = "overlay_config::serde_duration")] Duration),

    /// Expire at an absolute time
    At(DateTime<Utc>),
}

impl CachePolicy {
    /// Time left to live for an entry inserted at `now`, `None` for no expiration
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            CachePolicy::Never => None,
            CachePolicy::Immediately => Some(Duration::ZERO),
            CachePolicy::AfterDuration(duration) => Some(*duration),
            CachePolicy::At(at) => Some((*at - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: None,
            default_policy: CachePolicy::Never,
            collect_stats: true,
        }
    }
}

impl CacheConfig {
    /// Create a development configuration
    pub fn development() -> Self {
        Self {
            max_capacity: Some(1_000),
            default_policy: CachePolicy::AfterDuration(Duration::from_secs(60)),
            collect_stats: true,
        }
    }

    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            max_capacity: Some(100_000),
            default_policy: CachePolicy::Never,
            collect_stats: false,
        }
    }

    /// Check the configuration before building a cache
    pub fn validate(&self) -> Result<(), String> {
        if self.max_capacity == Some(0) {
            return Err("max_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}
