#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Fetch layer for prefetch
//!
//! A [`Fetcher`] materializes one module-level dependency into a directory
//! inside the output sandbox. This crate provides the module proxy fetcher,
//! a fetcher for modules that live inside the project, a retrying wrapper,
//! and a bounded pool that stages a whole batch and commits it to the cache
//! only when every fetch succeeded.

mod local;
mod pool;
mod proxy;
mod retry;

pub use local::LocalModuleFetcher;
pub use pool::{FetchPool, FetchedArtifact};
pub use proxy::{ProxyFetcher, DEFAULT_PROXY_URL};
pub use retry::{RetryConfig, RetryingFetcher};

use async_trait::async_trait;
use prefetch_errors::{ConsistencyError, Error};
use prefetch_root::{Sandbox, SandboxedPath};
use prefetch_types::{
    escape_module_path, validate_dependency_name, EffectiveDependency, VersionRef,
};
use std::fmt;
use std::path::PathBuf;

/// One module to fetch, with its version already classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub name: String,
    pub version: String,
    pub reference: VersionRef,
}

impl FetchRequest {
    /// Build a request from a module-level effective dependency
    ///
    /// # Errors
    ///
    /// Returns `DirectiveError::InvalidRecord` if the name cannot serve as a
    /// cache directory, `ConsistencyError::MissingVersion` if the dependency
    /// has no version, or a version error if it cannot be classified.
    pub fn from_dependency(dependency: &EffectiveDependency) -> Result<Self, Error> {
        validate_dependency_name(&dependency.name)?;
        let version = dependency
            .version
            .clone()
            .ok_or_else(|| ConsistencyError::MissingVersion {
                name: dependency.name.clone(),
                kind: dependency.kind.to_string(),
            })?;
        let reference = VersionRef::parse(&dependency.name, &version)?;
        Ok(Self {
            name: dependency.name.clone(),
            version,
            reference,
        })
    }

    /// Directory for this module, relative to a staging or cache root
    ///
    /// Remote modules use the `<escaped path>/@v` layout of module caches;
    /// project-local modules go to `<escaped path>/@local`.
    #[must_use]
    pub fn module_dir(&self) -> PathBuf {
        let leaf = if self.reference.is_local() { "@local" } else { "@v" };
        PathBuf::from(escape_module_path(&self.name)).join(leaf)
    }

    /// Version as it appears in cache file names
    #[must_use]
    pub fn escaped_version(&self) -> String {
        escape_module_path(&self.version)
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Retrieves a module into a confined destination directory
///
/// Implementations must write only through `output`'s helpers, passing
/// paths under `destination.relative()`, so that every write is confined
/// again at the moment it happens.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `request` into `destination`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transient` for failures worth retrying and any
    /// other error for final failures.
    async fn fetch(
        &self,
        request: &FetchRequest,
        output: &Sandbox,
        destination: &SandboxedPath,
    ) -> Result<(), Error>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for &T {
    async fn fetch(
        &self,
        request: &FetchRequest,
        output: &Sandbox,
        destination: &SandboxedPath,
    ) -> Result<(), Error> {
        (**self).fetch(request, output, destination).await
    }
}
