//! Resolved manifest definitions

use crate::dependency::{DependencyKind, Package};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One resolved dependency in the output manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub replaced: bool,
}

impl PartialOrd for ManifestEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sorted by kind, name, version (byte-wise), then original name
impl Ord for ManifestEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.name.as_bytes().cmp(other.name.as_bytes()))
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.original_name.cmp(&other.original_name))
            .then_with(|| self.replaced.cmp(&other.replaced))
    }
}

/// Deterministically ordered result of a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub root: Package,
    pub modules: Vec<ManifestEntry>,
    pub packages: Vec<ManifestEntry>,
}

impl Manifest {
    /// Create a manifest; both lists are sorted
    #[must_use]
    pub fn new(
        root: Package,
        mut modules: Vec<ManifestEntry>,
        mut packages: Vec<ManifestEntry>,
    ) -> Self {
        modules.sort();
        packages.sort();
        Self {
            root,
            modules,
            packages,
        }
    }

    /// Every entry, ordered by (kind, name, version)
    #[must_use]
    pub fn entries(&self) -> Vec<&ManifestEntry> {
        let mut entries: Vec<&ManifestEntry> =
            self.modules.iter().chain(self.packages.iter()).collect();
        entries.sort();
        entries
    }

    /// Look up a module-level entry by effective name
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ManifestEntry> {
        self.modules.iter().find(|entry| entry.name == name)
    }

    /// Look up an entry by the name it had before a rename
    #[must_use]
    pub fn by_original_name(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries()
            .into_iter()
            .find(|entry| entry.original_name.as_deref().unwrap_or(&entry.name) == name)
    }

    /// Stable JSON rendering used for diffing and hashing
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_canonical_json(&self) -> Result<String, prefetch_errors::Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// BLAKE3 digest of the canonical JSON, hex encoded
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn digest(&self) -> Result<String, prefetch_errors::Error> {
        let json = self.to_canonical_json()?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
