//! Feature-layered configuration for Overlay
//!
//! A base configuration is overridden by named feature layers. The crate provides the
//! registry that maps feature names and aliases to their layers, the resolver that merges
//! layers in request order and binds the result onto serde types, a directory loader for
//! feature files, and configurable strings built from templated slots.

pub mod binding;
pub mod error;
pub mod feature;
pub mod layer;
pub mod loader;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod section;
pub mod template;
pub mod utils;

// Re-export main types
pub use binding::{from_section, BindError};
pub use error::{ConfigError, ConfigResult};
pub use feature::FeatureName;
pub use layer::{ConfigurationLayer, KEY_DELIMITER};
pub use loader::OptionsLoader;
pub use metadata::{FeatureConfiguration, OptionsMetadata};
pub use registry::{LayerRegistry, LayerRegistryBuilder};
pub use resolver::LayeredResolver;
pub use section::Section;
pub use template::{expand, ConfigurableString};

// Re-export utilities
pub use utils::serde_duration;
