//! Case-insensitive feature names

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A canonical feature name or one of its aliases.
///
/// Equality and hashing ignore letter case (Unicode lowercase folding) while the original
/// spelling is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureName(String);

impl FeatureName {
    /// Wrap a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as it was written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the original spelling back
    pub fn into_string(self) -> String {
        self.0
    }

    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for FeatureName {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for FeatureName {}

impl Hash for FeatureName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            c.hash(state);
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FeatureName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FeatureName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FeatureName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut map = HashMap::new();
        map.insert(FeatureName::from("Sub_Example"), 1);

        assert_eq!(map.get(&FeatureName::from("sub_example")), Some(&1));
        assert_eq!(map.get(&FeatureName::from("SUB_EXAMPLE")), Some(&1));
        assert_eq!(map.get(&FeatureName::from("sub-example")), None);
    }

    #[test]
    fn test_unicode_folding_preserves_display() {
        let name = FeatureName::from("Größe");
        assert_eq!(name, FeatureName::from("GRÖßE"));
        assert_eq!(name.to_string(), "Größe");
    }
}
