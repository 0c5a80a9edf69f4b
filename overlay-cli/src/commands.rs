//! Command implementations. Each returns the text to print.

use anyhow::{Context, Result};
use chrono::Utc;
use overlay_caching::OptionsProvider;
use overlay_config::{ConfigurationLayer, LayerRegistry};
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use tracing::{debug, info};

async fn load_registry(dir: &Path) -> Result<LayerRegistry> {
    let mut builder = LayerRegistry::builder();
    builder
        .add_directory(dir)
        .await
        .with_context(|| format!("Failed to load features from {}", dir.display()))?;
    let registry = builder.build();
    info!("Loaded {} features from {}", registry.len(), dir.display());
    Ok(registry)
}

fn load_base(base: Option<&Path>) -> Result<ConfigurationLayer> {
    match base {
        Some(path) => {
            debug!("Loading base configuration from {}", path.display());
            ConfigurationLayer::from_file(path)
                .with_context(|| format!("Failed to load base configuration {}", path.display()))
        }
        None => Ok(ConfigurationLayer::new()),
    }
}

async fn load_provider(dir: &Path, base: Option<&Path>) -> Result<OptionsProvider> {
    let base = load_base(base)?;
    let registry = load_registry(dir).await?;
    Ok(OptionsProvider::new(base, registry))
}

/// One line per feature: name, aliases, owners and best-before date
pub async fn features(dir: &Path) -> Result<String> {
    let registry = load_registry(dir).await?;
    let now = Utc::now();

    let mut lines = Vec::with_capacity(registry.len());
    for name in registry.feature_names() {
        let mut line = name.clone();
        if let Some(metadata) = registry.metadata(name) {
            if !metadata.aliases.is_empty() {
                line.push_str(&format!("  aliases: {}", metadata.aliases.join(", ")));
            }
            if !metadata.owners.is_empty() {
                line.push_str(&format!("  owners: {}", metadata.owners));
            }
            if let Some(date) = metadata.best_before_date {
                let expired = if metadata.is_expired_at(now) { " (expired)" } else { "" };
                line.push_str(&format!("  best before: {}{}", date.format("%Y-%m-%d"), expired));
            }
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// The resolved value as pretty JSON, `null` when nothing defines the key
pub async fn resolve(
    dir: &Path,
    base: Option<&Path>,
    key: Option<&str>,
    features: &[String],
) -> Result<String> {
    let provider = load_provider(dir, base).await?;
    let names: Vec<&str> = features.iter().map(String::as_str).collect();

    let value = match key {
        Some(key) => provider.get_options::<JsonValue>(key, &names, None),
        None => provider.get_all_options::<JsonValue>(&names, None),
    }
    .with_context(|| format!("Failed to resolve features {:?}", features))?;

    let value = value.map_or(JsonValue::Null, |v| (*v).clone());
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Every feature's metadata and options as a pretty JSON array in registration order
pub async fn dump(dir: &Path, base: Option<&Path>) -> Result<String> {
    let provider = load_provider(dir, base).await?;
    let views = provider.get_all_configurations::<JsonValue>()?;

    let entries: Vec<JsonValue> = views
        .into_iter()
        .map(|view| {
            json!({
                "metadata": view.metadata,
                "options": view.configuration.map_or(JsonValue::Null, |v| (*v).clone()),
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn feature_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("example.json"),
            r#"{
  "metadata": { "aliases": ["ex"], "owners": "a@example.com", "bestBeforeDate": "2000-01-01" },
  "options": { "config": { "name": "example" } }
}"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(
            dir.path().join("sub/other.yaml"),
            "metadata: {}\noptions:\n  config:\n    name: other\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_features_lists_metadata() {
        let dir = feature_dir();
        let output = features(dir.path()).await.unwrap();
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "example  aliases: ex  owners: a@example.com  best before: 2000-01-01 (expired)"
        );
        assert_eq!(lines[1], "sub/other");
    }

    #[tokio::test]
    async fn test_resolve_with_base_and_features() {
        let dir = feature_dir();
        let base_dir = tempfile::tempdir().unwrap();
        let base = base_dir.path().join("base.json");
        fs::write(&base, r#"{ "config": { "name": "base", "level": 1 } }"#).unwrap();

        let output = resolve(
            dir.path(),
            Some(base.as_path()),
            Some("config"),
            &["sub/other".to_string(), "EX".to_string()],
        )
        .await
        .unwrap();
        let value: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(value, json!({ "name": "example", "level": "1" }));

        let missing = resolve(dir.path(), None, Some("nope"), &[]).await.unwrap();
        assert_eq!(missing, "null");
    }

    #[tokio::test]
    async fn test_resolve_unknown_feature_fails() {
        let dir = feature_dir();
        let err = resolve(dir.path(), None, None, &["missing".to_string()])
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("\"missing\" is not a known feature"));
    }

    #[tokio::test]
    async fn test_dump_in_registration_order() {
        let dir = feature_dir();
        let output = dump(dir.path(), None).await.unwrap();
        let value: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(value[0]["metadata"]["name"], "example");
        assert_eq!(value[0]["options"]["config"]["name"], "example");
        assert_eq!(value[1]["metadata"]["name"], "sub/other");
    }
}
