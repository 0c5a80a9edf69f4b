//! Bulk loading of feature files from a directory
//!
//! Every `*.json`, `*.yaml` and `*.yml` file below a root directory describes one feature:
//!
//! ```yaml
//! metadata:
//!   aliases: [sub_example]
//!   owners: someone@example.com
//! options:
//!   config:
//!     array: ["sub_example item 1"]
//! ```
//!
//! The feature name is the file path relative to the root without its extension, using
//! `/` as the separator. Files are read concurrently and registered in ordinal path order
//! so that collisions are reported the same way on every machine.

use crate::error::{ConfigError, ConfigResult};
use crate::layer::{extension_of, ConfigurationLayer};
use crate::metadata::{FeatureConfiguration, OptionsMetadata};
use crate::registry::LayerRegistryBuilder;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// On-disk shape of a feature file
#[derive(Debug, Deserialize)]
struct OptionsFile {
    #[serde(alias = "Metadata")]
    metadata: OptionsMetadata,

    #[serde(alias = "Options", default)]
    options: serde_json::Value,
}

/// Loads feature configurations from a directory tree
#[derive(Debug, Clone)]
pub struct OptionsLoader {
    root: PathBuf,
}

impl OptionsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Supported files below the root, sorted by path
    pub fn discover(&self) -> ConfigResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let supported = extension_of(entry.path())
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
            if supported {
                paths.push(entry.into_path());
            }
        }
        // Ordinal order of the whole path, so `a-c.json` comes before `a/b.json`
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        Ok(paths)
    }

    /// Read and parse every discovered file concurrently.
    ///
    /// Results come back in discovery order. Dropping the returned future aborts the
    /// reads that are still in flight.
    pub async fn load_all(&self) -> ConfigResult<Vec<(PathBuf, FeatureConfiguration)>> {
        let paths = self.discover()?;
        debug!(
            "Loading {} feature files from {}",
            paths.len(),
            self.root.display()
        );

        let mut tasks = JoinSet::new();
        for (index, path) in paths.iter().cloned().enumerate() {
            let root = self.root.clone();
            tasks.spawn(async move {
                let result = match tokio::fs::read_to_string(&path).await {
                    Ok(content) => parse_feature_file(&root, &path, &content),
                    Err(e) => Err(ConfigError::from(e)),
                };
                (index, result.map_err(|e| wrap_load_error(&path, e)))
            });
        }

        let mut results: Vec<Option<ConfigResult<FeatureConfiguration>>> =
            (0..paths.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) =
                joined.map_err(|e| ConfigError::LoadInterrupted(e.to_string()))?;
            results[index] = Some(result);
        }

        // The first failure in path order wins, whichever task finished first
        paths
            .into_iter()
            .zip(results)
            .map(|(path, result)| match result {
                Some(result) => result.map(|feature| (path, feature)),
                None => Err(ConfigError::LoadInterrupted("missing load result".into())),
            })
            .collect()
    }

    /// Read and parse a single file below the root
    pub fn load_file(&self, path: impl AsRef<Path>) -> ConfigResult<FeatureConfiguration> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .and_then(|content| parse_feature_file(&self.root, path, &content))
            .map_err(|e| wrap_load_error(path, e))
    }
}

fn wrap_load_error(path: &Path, source: ConfigError) -> ConfigError {
    ConfigError::SourceLoad {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

fn parse_feature_file(root: &Path, path: &Path, content: &str) -> ConfigResult<FeatureConfiguration> {
    let file: OptionsFile = match extension_of(path).as_deref() {
        Some("json") => serde_json::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };

    let mut metadata = file.metadata;
    metadata.name = feature_name_for(root, path);
    Ok(FeatureConfiguration::new(
        metadata,
        ConfigurationLayer::from_value(&file.options),
    ))
}

/// `root/sub dir/example.yaml` becomes `sub dir/example`
pub fn feature_name_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl LayerRegistryBuilder {
    /// Load every feature file below `root` and register it with
    /// [`add_configuration_source`](Self::add_configuration_source).
    ///
    /// Registration errors are wrapped with the path of the offending file.
    pub async fn add_directory(&mut self, root: impl AsRef<Path>) -> ConfigResult<&mut Self> {
        let loaded = OptionsLoader::new(root.as_ref()).load_all().await?;
        for (path, feature) in loaded {
            if let Err(source) = self.add_configuration_source(feature) {
                return Err(ConfigError::SourceRegistration {
                    path,
                    source: Box::new(source),
                });
            }
        }
        Ok(self)
    }
}
