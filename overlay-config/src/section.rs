//! Section trees materialized from flat layers

use crate::layer::KEY_DELIMITER;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One key segment.
///
/// Integer segments sort numerically and before other segments, everything else sorts
/// case-insensitively, so `items:10` follows `items:9` and `Name` equals `name`.
#[derive(Debug, Clone)]
pub(crate) struct SegmentKey(String);

impl SegmentKey {
    fn index(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl Ord for SegmentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.index(), other.index()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.folded().cmp(other.folded()),
        }
    }
}

impl PartialOrd for SegmentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SegmentKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SegmentKey {}

/// A node of the merged configuration.
///
/// A section may carry a raw value, children, both, or neither. A section with neither
/// was explicitly removed by a layer and binds as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    key: String,
    path: String,
    value: Option<String>,
    children: BTreeMap<SegmentKey, Section>,
}

impl Section {
    /// Build a tree from `(key, value)` pairs. Later pairs override earlier ones.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut root = Section::default();
        for (key, value) in entries {
            let mut node = &mut root;
            for segment in key.split(KEY_DELIMITER) {
                let path = if node.path.is_empty() {
                    segment.to_owned()
                } else {
                    format!("{}{}{}", node.path, KEY_DELIMITER, segment)
                };
                node = node
                    .children
                    .entry(SegmentKey(segment.to_owned()))
                    .or_insert_with(|| Section {
                        key: segment.to_owned(),
                        path,
                        ..Default::default()
                    });
            }
            node.value = value.map(str::to_owned);
        }
        root
    }

    /// Last segment of the key as first written
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Full key from the root, empty for the root itself
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn children(&self) -> impl Iterator<Item = &Section> {
        self.children.values()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// No value and no children
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Whether every child key is an array index
    pub fn is_sequence(&self) -> bool {
        self.has_children() && self.children.keys().all(|k| k.index().is_some())
    }

    /// Find a descendant by hierarchical key. An empty key is the section itself.
    pub fn get(&self, key: &str) -> Option<&Section> {
        if key.is_empty() {
            return Some(self);
        }
        key.split(KEY_DELIMITER).try_fold(self, |node, segment| {
            node.children.get(&SegmentKey(segment.to_owned()))
        })
    }

    /// Take a descendant out of the tree by hierarchical key
    pub fn into_child(mut self, key: &str) -> Option<Section> {
        if key.is_empty() {
            return Some(self);
        }
        for segment in key.split(KEY_DELIMITER) {
            self = self.children.remove(&SegmentKey(segment.to_owned()))?;
        }
        Some(self)
    }

    pub(crate) fn into_parts(self) -> (String, String, Option<String>, Vec<Section>) {
        (
            self.key,
            self.path,
            self.value,
            self.children.into_values().collect(),
        )
    }
}

/// Whether `key` equals `prefix` or lies below it, comparing segments case-insensitively
pub(crate) fn is_within(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    let mut segments = key.split(KEY_DELIMITER);
    prefix.split(KEY_DELIMITER).all(|expected| {
        segments
            .next()
            .is_some_and(|segment| SegmentKey(segment.to_owned()) == SegmentKey(expected.to_owned()))
    })
}
