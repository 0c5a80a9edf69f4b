//! Caching layer for Overlay
//!
//! [`OptionsProvider`] puts a compute-once cache in front of the layered resolver from
//! `overlay-config`. Entries can carry a [`CachePolicy`] that decides when they expire.

pub mod cache;
pub mod config;
pub mod errors;
pub mod provider;
pub mod stats;

// Re-export main types
pub use cache::{CacheKey, OptionsCache, OptionsKey, SourceId};
pub use config::{CacheConfig, CachePolicy};
pub use errors::{CacheError, CacheResult};
pub use provider::{FeatureConfigurationView, OptionsProvider};
pub use stats::CacheStats;
