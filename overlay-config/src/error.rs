//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading configuration file
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// An alias or feature name is already registered
    #[error("The alias \"{alias}\" for \"{feature}\" is already used as an alias or feature name.")]
    DuplicateRegistration { alias: String, feature: String },

    /// A feature already has a configuration layer
    #[error("The feature name \"{feature}\" already has a mapped configuration.")]
    DuplicateLayer { feature: String },

    /// Metadata was registered without a canonical name
    #[error("The feature configuration does not have a name.")]
    MissingFeatureName,

    /// A query referenced a name that is not in the alias table
    #[error("The given feature name \"{name}\" is not a known feature.")]
    UnknownFeature { name: String },

    /// Too many replacement rounds while expanding a configurable string
    #[error(
        "The replacement loop count exceeded the maximum allowed iterations ({max_iterations}). \
         There was likely a recursive loop using the template and values."
    )]
    TemplateExpansionOverflow { max_iterations: usize },

    /// Empty template delimiter
    #[error("Template delimiters cannot be empty")]
    InvalidDelimiter,

    /// The merged configuration could not be converted into the requested type
    #[error("Failed to bind configuration at \"{key}\": {message}")]
    Bind { key: String, message: String },

    /// A configuration file could not be read or parsed
    #[error("Failed to load configuration file \"{}\".", .path.display())]
    SourceLoad {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    /// A loaded configuration file could not be registered
    #[error("Error loading the configuration file at \"{}\".", .path.display())]
    SourceRegistration {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    /// Walking a configuration directory failed
    #[error("Failed to scan configuration directory: {0}")]
    DirectoryScan(#[from] walkdir::Error),

    /// A background load task did not finish
    #[error("Configuration loading was interrupted: {0}")]
    LoadInterrupted(String),
}

impl ConfigError {
    /// Whether this is a strict-mode registration collision
    pub fn is_duplicate_registration(&self) -> bool {
        matches!(
            self,
            ConfigError::DuplicateRegistration { .. } | ConfigError::DuplicateLayer { .. }
        )
    }

    /// Whether a query named a feature that is not registered
    pub fn is_unknown_feature(&self) -> bool {
        matches!(self, ConfigError::UnknownFeature { .. })
    }
}
