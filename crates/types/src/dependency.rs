//! Dependency record definitions

use crate::manifest::ManifestEntry;
use crate::version::VersionRef;
use prefetch_errors::{DirectiveError, VersionError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Dependency kind
///
/// Serialized with the tags used by dependency listings (`gomod`,
/// `go-package`). Ordering follows the byte order of those tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DependencyKind {
    /// Whole versioned module
    #[serde(rename = "gomod")]
    GoModule,
    /// Importable package inside a module or the main project
    #[serde(rename = "go-package")]
    GoPackage,
}

/// Granularity of a dependency kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Module,
    Package,
}

impl DependencyKind {
    /// Wire tag for this kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoModule => "gomod",
            Self::GoPackage => "go-package",
        }
    }

    #[must_use]
    pub fn granularity(self) -> Granularity {
        match self {
            Self::GoModule => Granularity::Module,
            Self::GoPackage => Granularity::Package,
        }
    }

    #[must_use]
    pub fn is_module(self) -> bool {
        self.granularity() == Granularity::Module
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for DependencyKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DependencyKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().as_bytes().cmp(other.as_str().as_bytes())
    }
}

/// Identity of a dependency (name + kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyId {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

impl DependencyId {
    /// Create a new dependency ID
    pub fn new(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Dependency record as produced by a manifest parser
///
/// `replaces` is recursive here only so that malformed, chained input can be
/// represented and rejected. See [`Dependency::from_raw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDependency {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub replaces: Option<Box<RawDependency>>,
}

impl RawDependency {
    /// Create a raw record without replacement
    pub fn new(name: impl Into<String>, kind: DependencyKind, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            version: version.map(str::to_string),
            replaces: None,
        }
    }

    /// Attach a replacement record
    #[must_use]
    pub fn with_replacement(mut self, replacement: RawDependency) -> Self {
        self.replaces = Some(Box::new(replacement));
        self
    }
}

/// Target of a replace directive
///
/// Has no replacement of its own, so directives cannot chain once a record
/// has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplacementTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    pub version: String,
}

impl ReplacementTarget {
    pub fn new(name: impl Into<String>, kind: DependencyKind, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            version: version.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> DependencyId {
        DependencyId::new(self.name.clone(), self.kind)
    }
}

impl fmt::Display for ReplacementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Validated dependency record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    pub version: Option<String>,
    #[serde(rename = "replaces", skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<ReplacementTarget>,
}

impl Dependency {
    /// Create a dependency without replacement
    pub fn new(name: impl Into<String>, kind: DependencyKind, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            version: version.map(str::to_string),
            replaced_by: None,
        }
    }

    /// Validate a raw record
    ///
    /// # Errors
    ///
    /// Returns a `DirectiveError` if the record has an empty name, or if its
    /// replacement is itself replaced, has no version, or is of another kind.
    pub fn from_raw(raw: &RawDependency) -> Result<Self, DirectiveError> {
        if raw.name.trim().is_empty() {
            return Err(DirectiveError::InvalidRecord {
                name: raw.name.clone(),
                message: "empty dependency name".to_string(),
            });
        }
        validate_dependency_name(&raw.name)?;

        let replaced_by = match raw.replaces.as_deref() {
            None => None,
            Some(replacement) => Some(Self::validate_replacement(raw, replacement)?),
        };

        Ok(Self {
            name: raw.name.clone(),
            kind: raw.kind,
            version: raw.version.clone(),
            replaced_by,
        })
    }

    fn validate_replacement(
        raw: &RawDependency,
        replacement: &RawDependency,
    ) -> Result<ReplacementTarget, DirectiveError> {
        if replacement.replaces.is_some() {
            return Err(DirectiveError::Chained {
                name: raw.name.clone(),
                kind: raw.kind.to_string(),
                replacement: replacement.name.clone(),
            });
        }
        if replacement.kind != raw.kind {
            return Err(DirectiveError::KindMismatch {
                name: raw.name.clone(),
                source_kind: raw.kind.to_string(),
                replacement_kind: replacement.kind.to_string(),
            });
        }
        if replacement.name.trim().is_empty() {
            return Err(DirectiveError::InvalidRecord {
                name: raw.name.clone(),
                message: "replacement has an empty name".to_string(),
            });
        }
        validate_dependency_name(&replacement.name).map_err(|_| DirectiveError::InvalidRecord {
            name: raw.name.clone(),
            message: format!("invalid replacement name {}", replacement.name),
        })?;
        let version =
            replacement
                .version
                .clone()
                .ok_or_else(|| DirectiveError::MissingReplacementVersion {
                    name: raw.name.clone(),
                })?;

        Ok(ReplacementTarget::new(
            replacement.name.clone(),
            replacement.kind,
            version,
        ))
    }

    #[must_use]
    pub fn id(&self) -> DependencyId {
        DependencyId::new(self.name.clone(), self.kind)
    }

    /// Classify the version string, if present
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` for unrecognised version strings.
    pub fn version_ref(&self) -> Result<Option<VersionRef>, VersionError> {
        self.version
            .as_deref()
            .map(|version| VersionRef::parse(&self.name, version))
            .transpose()
    }
}

/// Root unit whose dependencies are being resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    #[serde(default)]
    pub version: Option<String>,
}

impl Package {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: DependencyKind, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            version: version.map(str::to_string),
        }
    }
}

/// Dependency after replace resolution
///
/// Keeps the original record for traceability; `name` and `version` are the
/// effective values presented downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveDependency {
    pub original: Dependency,
    pub name: String,
    pub kind: DependencyKind,
    pub version: Option<String>,
}

impl EffectiveDependency {
    /// Effective record for a dependency with no directive applied
    #[must_use]
    pub fn unreplaced(original: Dependency) -> Self {
        Self {
            name: original.name.clone(),
            kind: original.kind,
            version: original.version.clone(),
            original,
        }
    }

    /// Effective record taking name and version from `target`
    #[must_use]
    pub fn replaced(mut original: Dependency, target: ReplacementTarget) -> Self {
        let name = target.name.clone();
        let version = Some(target.version.clone());
        let kind = target.kind;
        original.replaced_by = Some(target);
        Self {
            original,
            name,
            kind,
            version,
        }
    }

    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original.name
    }

    #[must_use]
    pub fn is_replaced(&self) -> bool {
        self.original.replaced_by.is_some()
    }

    #[must_use]
    pub fn is_renamed(&self) -> bool {
        self.name != self.original.name
    }

    /// Whether `name` is this dependency (effective or original) or below it
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        path_contains(&self.name, name) || path_contains(&self.original.name, name)
    }

    #[must_use]
    pub fn to_manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            name: self.name.clone(),
            kind: self.kind,
            version: self.version.clone(),
            original_name: self.is_renamed().then(|| self.original.name.clone()),
            replaced: self.is_replaced(),
        }
    }
}

/// Check that `name` is a relative `/`-separated path without dot segments
///
/// Module names become directories under the cache, so names that would
/// leave their own subtree are refused.
///
/// # Errors
///
/// Returns `DirectiveError::InvalidRecord` for empty or absolute names and
/// for names with an empty, `.` or `..` segment.
pub fn validate_dependency_name(name: &str) -> Result<(), DirectiveError> {
    let message = if name.trim().is_empty() {
        "empty dependency name"
    } else if name.starts_with('/') || name.contains('\\') {
        "dependency name must be a relative path"
    } else if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        "dependency name has an empty or dot segment"
    } else {
        return Ok(());
    };
    Err(DirectiveError::InvalidRecord {
        name: name.to_string(),
        message: message.to_string(),
    })
}

/// Path-prefix containment on `/`-separated names
#[must_use]
pub fn path_contains(prefix: &str, name: &str) -> bool {
    name == prefix
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Escape a module path or version for case-insensitive filesystems
///
/// Every upper-case ASCII letter becomes `!` followed by its lower-case form,
/// the layout used by module caches.
#[must_use]
pub fn escape_module_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}
