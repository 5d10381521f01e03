#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Path confinement for prefetch
//!
//! This crate provides [`Sandbox`], which resolves caller-supplied paths
//! against a fixed root and refuses anything that lands outside it once
//! symbolic links and `..` segments are followed, plus filesystem helpers
//! that confine their target immediately before every operation.
//!
//! Confinement results are never cached. A link can be swapped between two
//! calls, so every access resolves the path again from scratch.

mod fs_ops;

use prefetch_errors::SandboxError;
use std::path::{Component, Path, PathBuf};

/// Result type for sandbox operations
type Result<T> = std::result::Result<T, prefetch_errors::Error>;

/// Upper bound on symbolic links followed while resolving one path
const MAX_SYMLINK_HOPS: usize = 40;

/// Whether the confined path has to exist already
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// The path must exist
    Required,
    /// The path may be about to be created; only its existing prefix is
    /// used for link resolution
    MayBeMissing,
}

/// A path verified to be equal to or below a sandbox root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedPath {
    path: PathBuf,
    relative: PathBuf,
    exists: bool,
}

impl SandboxedPath {
    /// Absolute, resolved path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the sandbox root
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Whether the path existed when it was confined
    #[must_use]
    pub fn existed(&self) -> bool {
        self.exists
    }

    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for SandboxedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Filesystem root that every confined path must stay inside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open a sandbox over an existing absolute directory
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::InvalidRoot` if the path is relative, missing,
    /// or not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let invalid = |reason: &str| SandboxError::InvalidRoot {
            path: root.display().to_string(),
            reason: reason.to_string(),
        };

        if !root.is_absolute() {
            return Err(invalid("path is not absolute").into());
        }

        let canonical = std::fs::canonicalize(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => invalid("directory does not exist"),
            _ => invalid(&e.to_string()),
        })?;

        if !canonical.is_dir() {
            return Err(invalid("not a directory").into());
        }

        Ok(Self { root: canonical })
    }

    /// Canonical root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` and verify it stays inside the root
    ///
    /// Relative paths are taken relative to the root; absolute paths are
    /// accepted only if they resolve inside it.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Escape` if the resolved path lies outside the
    /// root, `SandboxError::NotFound` if `existence` is `Required` and the
    /// path does not exist, or `SandboxError::Io` if a stat call fails.
    pub fn confine(&self, path: impl AsRef<Path>, existence: Existence) -> Result<SandboxedPath> {
        let requested = path.as_ref();
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        let (resolved, exists) = resolve(&joined, requested, 0)?;

        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            tracing::warn!(
                path = %requested.display(),
                resolved = %resolved.display(),
                root = %self.root.display(),
                "refusing path outside sandbox"
            );
            return Err(SandboxError::Escape {
                path: requested.display().to_string(),
                root: self.root.display().to_string(),
                resolved: resolved.display().to_string(),
            }
            .into());
        };
        let relative = relative.to_path_buf();

        if existence == Existence::Required && !exists {
            return Err(SandboxError::NotFound {
                path: requested.display().to_string(),
            }
            .into());
        }

        Ok(SandboxedPath {
            path: resolved,
            relative,
            exists,
        })
    }

    /// Confine a path that may not exist yet
    ///
    /// # Errors
    ///
    /// See [`Sandbox::confine`].
    pub fn join_within_root(&self, path: impl AsRef<Path>) -> Result<SandboxedPath> {
        self.confine(path, Existence::MayBeMissing)
    }

    /// Confine a path that must already exist
    ///
    /// # Errors
    ///
    /// See [`Sandbox::confine`].
    pub fn resolve_existing(&self, path: impl AsRef<Path>) -> Result<SandboxedPath> {
        self.confine(path, Existence::Required)
    }

    /// Open a narrower sandbox rooted at an existing directory inside this one
    ///
    /// # Errors
    ///
    /// Returns an error if the directory escapes this sandbox, does not
    /// exist, or is not a directory.
    pub fn re_root(&self, path: impl AsRef<Path>) -> Result<Sandbox> {
        let inner = self.resolve_existing(path)?;
        Sandbox::new(inner.path())
    }
}

/// Walk `path` component by component, following links through their
/// targets, and report whether the final path exists
fn resolve(path: &Path, requested: &Path, hops: usize) -> Result<(PathBuf, bool)> {
    if hops > MAX_SYMLINK_HOPS {
        return Err(SandboxError::Io {
            path: requested.display().to_string(),
            message: "too many levels of symbolic links".to_string(),
        }
        .into());
    }

    let mut resolved = PathBuf::new();
    let mut missing = false;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                // Back on existing ground, links must be followed again.
                if missing {
                    missing = std::fs::symlink_metadata(&resolved).is_err();
                }
            }
            Component::Normal(name) => {
                resolved.push(name);
                if missing {
                    continue;
                }

                match std::fs::symlink_metadata(&resolved) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        let target = std::fs::read_link(&resolved)
                            .map_err(|e| SandboxError::from_io_with_path(&e, requested))?;
                        let next = match resolved.parent() {
                            Some(parent) if target.is_relative() => parent.join(target),
                            _ => target,
                        };
                        let (followed, exists) = resolve(&next, requested, hops + 1)?;
                        resolved = followed;
                        missing = !exists;
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => missing = true,
                    Err(e) => {
                        return Err(SandboxError::Io {
                            path: requested.display().to_string(),
                            message: e.to_string(),
                        }
                        .into())
                    }
                }
            }
        }
    }

    Ok((resolved, !missing))
}
