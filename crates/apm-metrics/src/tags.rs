// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

/// Tag set with unique keys, always iterated in lexicographic key order.
///
/// Ordering is what lets two logically equal tag sets collapse to the same
/// measurement key and encode to the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortedTags {
    values: BTreeMap<String, String>,
}

pub const EMPTY_TAGS: SortedTags = SortedTags {
    values: BTreeMap::new(),
};

impl SortedTags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tag, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns a copy of these tags with one more entry.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = self.clone();
        tags.insert(key, value);
        tags
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for SortedTags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for SortedTags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_is_sorted_by_key() {
        let tags = SortedTags::from([("zone", "b"), ("app", "web"), ("env", "prod")]);
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["app", "env", "zone"]);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut tags = SortedTags::new();
        tags.insert("env", "staging");
        tags.insert("env", "prod");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("env"), Some("prod"));
    }

    #[test]
    fn test_with_leaves_source_untouched() {
        let base = SortedTags::from([("TransactionName", "/users")]);
        let extended = base.with("HttpMethod", "GET");
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.get("HttpMethod"), Some("GET"));
    }
}
