//! Cache error types

use overlay_config::ConfigError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Cache-related errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Feature names could not be resolved before the cache was consulted
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Computing the options failed. Callers waiting on the same computation share it.
    #[error(transparent)]
    Resolution(Arc<ConfigError>),

    /// A cached value did not have the requested type
    #[error("Cached options are not of type {0}")]
    TypeMismatch(&'static str),

    /// Invalid configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),
}

impl CacheError {
    /// The configuration error behind this failure, if any
    pub fn config_error(&self) -> Option<&ConfigError> {
        match self {
            CacheError::Config(e) => Some(e),
            CacheError::Resolution(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    pub fn is_unknown_feature(&self) -> bool {
        self.config_error()
            .is_some_and(ConfigError::is_unknown_feature)
    }
}

impl From<Arc<ConfigError>> for CacheError {
    fn from(err: Arc<ConfigError>) -> Self {
        CacheError::Resolution(err)
    }
}
