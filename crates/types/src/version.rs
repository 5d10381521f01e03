//! Version reference classification
//!
//! Dependency versions arrive as plain strings in one of three shapes:
//! - `v1.4.2` / `v2.0.0+incompatible` - a tagged semantic version
//! - `v0.0.0-20160315200505-970db520ece7` - a pseudo-version pinning a commit
//! - `./staging/src/k8s.io/metrics` - a module directory inside the project

use prefetch_errors::VersionError;
use semver::Version;
use std::fmt;
use std::path::{Path, PathBuf};

/// Length of the UTC timestamp embedded in a pseudo-version
const PSEUDO_TIMESTAMP_LEN: usize = 14;
/// Length of the abbreviated commit hash embedded in a pseudo-version
const PSEUDO_REVISION_LEN: usize = 12;

/// A classified dependency version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRef {
    /// Tagged release
    Semantic(Version),
    /// Untagged commit pinned through a pseudo-version
    Pseudo {
        base: Version,
        timestamp: String,
        revision: String,
    },
    /// Module directory relative to the project root
    Local(PathBuf),
}

impl VersionRef {
    /// Classify a version string for dependency `name`
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` when the string is neither a
    /// local path nor a `v`-prefixed semantic version.
    pub fn parse(name: &str, input: &str) -> Result<Self, VersionError> {
        if is_local_reference(input) {
            return Ok(Self::Local(PathBuf::from(input)));
        }

        let invalid = || VersionError::InvalidVersion {
            name: name.to_string(),
            input: input.to_string(),
        };

        let semantic = input.strip_prefix('v').ok_or_else(invalid)?;
        let version = Version::parse(semantic).map_err(|_| invalid())?;

        if let Some((timestamp, revision)) = split_pseudo(version.pre.as_str()) {
            return Ok(Self::Pseudo {
                base: Version::new(version.major, version.minor, version.patch),
                timestamp: timestamp.to_string(),
                revision: revision.to_string(),
            });
        }

        Ok(Self::Semantic(version))
    }

    /// Whether this version points at a directory inside the project
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Local module directory, if any
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(version) => write!(f, "v{version}"),
            Self::Pseudo {
                base,
                timestamp,
                revision,
            } => write!(f, "v{base} ({timestamp}, {revision})"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

fn is_local_reference(input: &str) -> bool {
    input == "."
        || input == ".."
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('/')
}

/// Split a pre-release of the form `[...]yyyymmddhhmmss-abcdef123456`
fn split_pseudo(pre: &str) -> Option<(&str, &str)> {
    let (head, revision) = pre.rsplit_once('-')?;
    let timestamp = head.rsplit('.').next()?;

    let timestamp_ok = timestamp.len() == PSEUDO_TIMESTAMP_LEN
        && timestamp.bytes().all(|b| b.is_ascii_digit());
    let revision_ok = revision.len() == PSEUDO_REVISION_LEN
        && revision.bytes().all(|b| b.is_ascii_hexdigit());

    (timestamp_ok && revision_ok).then_some((timestamp, revision))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_versions() {
        let v = VersionRef::parse("gopkg.in/yaml.v2", "v2.2.2").unwrap();
        assert_eq!(v, VersionRef::Semantic(Version::new(2, 2, 2)));

        let v = VersionRef::parse("github.com/x/y", "v2.0.0+incompatible").unwrap();
        assert!(matches!(v, VersionRef::Semantic(ref s) if s.major == 2));
    }

    #[test]
    fn test_pseudo_versions() {
        let v = VersionRef::parse(
            "github.com/op/go-logging",
            "v0.0.0-20160315200505-970db520ece7",
        )
        .unwrap();
        assert_eq!(
            v,
            VersionRef::Pseudo {
                base: Version::new(0, 0, 0),
                timestamp: "20160315200505".to_string(),
                revision: "970db520ece7".to_string(),
            }
        );

        // Pseudo-version derived from a pre-release tag
        let v = VersionRef::parse("x", "v1.2.4-0.20190308221718-c2843e01d9a2").unwrap();
        assert!(matches!(v, VersionRef::Pseudo { ref timestamp, .. } if timestamp == "20190308221718"));

        // Regular pre-release is not a pseudo-version
        let v = VersionRef::parse("x", "v1.0.0-rc.1").unwrap();
        assert!(matches!(v, VersionRef::Semantic(_)));
    }

    #[test]
    fn test_local_versions() {
        let v = VersionRef::parse("k8s.io/metrics", "./staging/src/k8s.io/metrics").unwrap();
        assert!(v.is_local());
        assert_eq!(
            v.local_path(),
            Some(Path::new("./staging/src/k8s.io/metrics"))
        );
        assert!(VersionRef::parse("x", "../sibling").unwrap().is_local());
    }

    #[test]
    fn test_invalid_versions() {
        assert!(VersionRef::parse("x", "1.2.3").is_err());
        assert!(VersionRef::parse("x", "vlatest").is_err());
        assert!(VersionRef::parse("x", "").is_err());
    }
}
