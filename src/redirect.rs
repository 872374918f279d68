//! Category-scoped redirect maps
//!
//! As artifacts are migrated, every category of artifact accumulates a
//! substitution table translating source-environment strings (ids,
//! server paths, container names) to their target-environment
//! equivalents. Categories consumed later in the dependency walk read
//! maps populated by earlier categories: semantic-model rewriting needs
//! the storage-container redirects, report rewriting needs the
//! semantic-model redirects.
//!
//! Entries are appended, never removed, during one reconciliation run.

use std::collections::BTreeMap;

use crate::error::{CaravanError, CaravanResult};

/// Redirect map category, one per artifact family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedirectCategory {
    Connection,
    StorageContainer,
    /// Notebooks and pipelines share one map
    ComputeUnit,
    SemanticModel,
    Report,
}

impl RedirectCategory {
    pub const ALL: [RedirectCategory; 5] = [
        RedirectCategory::Connection,
        RedirectCategory::StorageContainer,
        RedirectCategory::ComputeUnit,
        RedirectCategory::SemanticModel,
        RedirectCategory::Report,
    ];
}

impl std::fmt::Display for RedirectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RedirectCategory::Connection => "connection",
            RedirectCategory::StorageContainer => "storage-container",
            RedirectCategory::ComputeUnit => "compute-unit",
            RedirectCategory::SemanticModel => "semantic-model",
            RedirectCategory::Report => "report",
        };
        f.write_str(name)
    }
}

/// Accumulates string→string substitution tables as migration proceeds
#[derive(Debug, Clone, Default)]
pub struct RedirectMaps {
    maps: BTreeMap<RedirectCategory, BTreeMap<String, String>>,
}

impl RedirectMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the named category's map.
    ///
    /// Re-recording an identical pair is a no-op; recording the same
    /// source key against a different target is an error, since a
    /// conflicting entry would make substitution results depend on
    /// insertion order.
    pub fn record(
        &mut self,
        category: RedirectCategory,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> CaravanResult<()> {
        let source_key = source_key.into();
        let target_key = target_key.into();
        let map = self.maps.entry(category).or_default();

        match map.get(&source_key) {
            Some(existing) if *existing == target_key => Ok(()),
            Some(existing) => Err(CaravanError::DuplicateRedirectKey {
                category: category.to_string(),
                key: source_key,
                existing: existing.clone(),
                conflicting: target_key,
            }),
            None => {
                map.insert(source_key, target_key);
                Ok(())
            }
        }
    }

    /// Record the same pair into several categories at once
    pub fn record_all(
        &mut self,
        categories: &[RedirectCategory],
        source_key: &str,
        target_key: &str,
    ) -> CaravanResult<()> {
        for category in categories {
            self.record(*category, source_key, target_key)?;
        }
        Ok(())
    }

    /// Union the `from` category's entries into `into`.
    ///
    /// Compute units and semantic models start from the connection
    /// redirects; merging keeps those categories self-contained when
    /// they are snapshotted for a rewrite.
    pub fn merge(&mut self, from: RedirectCategory, into: RedirectCategory) -> CaravanResult<()> {
        let entries: Vec<(String, String)> = self
            .maps
            .get(&from)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        for (k, v) in entries {
            self.record(into, k, v)?;
        }
        Ok(())
    }

    pub fn contains(&self, category: RedirectCategory, source_key: &str) -> bool {
        self.maps
            .get(&category)
            .is_some_and(|m| m.contains_key(source_key))
    }

    pub fn target(&self, category: RedirectCategory, source_key: &str) -> Option<&str> {
        self.maps
            .get(&category)
            .and_then(|m| m.get(source_key))
            .map(String::as_str)
    }

    pub fn len(&self, category: RedirectCategory) -> usize {
        self.maps.get(&category).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, category: RedirectCategory) -> bool {
        self.len(category) == 0
    }

    /// Snapshot a category's entries sorted by descending source-key
    /// length, ties broken lexicographically.
    ///
    /// This ordering is the substitution contract: applying a shorter
    /// key that is a substring of a longer key first would corrupt the
    /// longer replacement. All rewrites must consume this snapshot
    /// as-is.
    pub fn snapshot(&self, category: RedirectCategory) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .maps
            .get(&category)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        entries
    }
}
