//! Module/package consistency error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConsistencyError {
    #[error("package {package}@{package_version} disagrees with module {module}@{module_version}")]
    VersionMismatch {
        package: String,
        package_version: String,
        module: String,
        module_version: String,
    },

    #[error("package {name}@{version} is not provided by any module or the main package")]
    OrphanPackage { name: String, version: String },

    #[error("package {package} is claimed by more than one owner: {candidates}")]
    AmbiguousOwner { package: String, candidates: String },

    #[error("module-level directive for {module} overlaps package-level directive for {package}")]
    OverlappingDirectives { module: String, package: String },

    #[error("module {name} resolves to conflicting versions {first} and {second}")]
    ConflictingModuleVersions {
        name: String,
        first: String,
        second: String,
    },

    #[error("{kind} dependency {name} has no version")]
    MissingVersion { name: String, kind: String },
}

impl UserFacingError for ConsistencyError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::VersionMismatch { .. } | Self::ConflictingModuleVersions { .. } => {
                Some("Regenerate the dependency listing so module and package versions agree.")
            }
            Self::OrphanPackage { .. } => {
                Some("Add the module that provides this package to the module listing.")
            }
            Self::OverlappingDirectives { .. } | Self::AmbiguousOwner { .. } => {
                Some("Remove one of the overlapping entries; no precedence is assumed.")
            }
            Self::MissingVersion { .. } => Some("Every external dependency needs a version."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::VersionMismatch { .. } => "consistency.version_mismatch",
            Self::OrphanPackage { .. } => "consistency.orphan_package",
            Self::AmbiguousOwner { .. } => "consistency.ambiguous_owner",
            Self::OverlappingDirectives { .. } => "consistency.overlapping_directives",
            Self::ConflictingModuleVersions { .. } => "consistency.conflicting_module_versions",
            Self::MissingVersion { .. } => "consistency.missing_version",
        };
        Some(code)
    }
}
