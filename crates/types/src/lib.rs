#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the prefetch dependency resolver
//!
//! This crate provides the shared data shapes: dependency records, replace
//! directives, environment variables and the resolved manifest.

pub mod dependency;
pub mod directive;
pub mod environment;
pub mod manifest;
pub mod version;

// Re-export commonly used types
pub use dependency::{
    escape_module_path, path_contains, validate_dependency_name, Dependency, DependencyId,
    DependencyKind, EffectiveDependency, Granularity, Package, RawDependency,
    ReplacementTarget,
};
pub use directive::ReplaceDirective;
pub use environment::{EnvVarKind, EnvVarSpec, EnvironmentVariable};
pub use manifest::{Manifest, ManifestEntry};
pub use semver::Version;
pub use version::VersionRef;
