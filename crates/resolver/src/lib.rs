#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for prefetch
//!
//! This crate turns the raw dependency records of one project into a
//! deterministic manifest. Replace directives are applied in a single pass,
//! package-level units are attributed to the module that provides them, and
//! a full session then fetches every module and builds the isolated
//! environment for an offline build.

mod classify;
mod graph;
mod replace;
mod resolver;

pub use classify::{Classification, ClassifiedPackage, Owner, PackageClassifier};
pub use graph::{ModuleGraph, ModuleNode};
pub use replace::ReplaceResolver;
pub use resolver::{HermeticSession, ModuleGraphResolver, Resolution, ResolutionRequest};
