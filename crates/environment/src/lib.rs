#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Isolated toolchain environment for hermetic builds
//!
//! [`EnvironmentBuilder`] turns configured variable specs into concrete
//! values: `path` variables are confined to the output sandbox and their
//! directories created, `literal` variables pass through unchanged.

mod render;

pub use render::EnvFormat;

use prefetch_config::EnvironmentConfig;
use prefetch_errors::{ConfigError, Error};
use prefetch_events::{AppEvent, CorrelatedEmitter, EnvironmentEvent, EventEmitter};
use prefetch_root::Sandbox;
use prefetch_types::{EnvVarKind, EnvVarSpec, EnvironmentVariable};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Builds the environment for one output root
pub struct EnvironmentBuilder<'a> {
    sandbox: &'a Sandbox,
    specs: Vec<EnvVarSpec>,
    events: CorrelatedEmitter,
}

impl<'a> EnvironmentBuilder<'a> {
    #[must_use]
    pub fn new(sandbox: &'a Sandbox, config: &EnvironmentConfig) -> Self {
        Self::from_specs(sandbox, config.variables.clone())
    }

    #[must_use]
    pub fn from_specs(sandbox: &'a Sandbox, specs: Vec<EnvVarSpec>) -> Self {
        Self {
            sandbox,
            specs,
            events: CorrelatedEmitter::disabled(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: CorrelatedEmitter) -> Self {
        self.events = events;
        self
    }

    /// Resolve every variable, creating directories for path variables
    ///
    /// Calling this again for the same root yields the same variables;
    /// directories that already exist are left alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for empty or duplicate names, a
    /// sandbox error if a path value resolves outside the root, or an I/O
    /// error if a directory cannot be created.
    pub async fn build(&self) -> Result<Environment, Error> {
        let mut seen = HashSet::new();
        let mut variables = Vec::with_capacity(self.specs.len());

        for spec in &self.specs {
            if spec.name.is_empty() || !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("invalid or duplicate environment variable {:?}", spec.name),
                }
                .into());
            }

            let value = match spec.kind {
                EnvVarKind::Literal => spec.value.clone(),
                EnvVarKind::Path => self.resolve_path(spec).await?,
            };

            self.events
                .emit(AppEvent::Environment(EnvironmentEvent::VariableResolved {
                    name: spec.name.clone(),
                    value: value.clone(),
                    kind: spec.kind.to_string(),
                }));

            variables.push(EnvironmentVariable {
                name: spec.name.clone(),
                value,
                kind: spec.kind,
            });
        }

        self.events
            .emit(AppEvent::Environment(EnvironmentEvent::Built {
                variables: variables.len(),
            }));

        Ok(Environment {
            root: self.sandbox.root().to_path_buf(),
            variables,
        })
    }

    async fn resolve_path(&self, spec: &EnvVarSpec) -> Result<String, Error> {
        let directory = self.sandbox.create_dir_all(&spec.value).await?;
        tracing::debug!(
            name = %spec.name,
            path = %directory.path().display(),
            "path variable ready"
        );
        self.events
            .emit(AppEvent::Environment(EnvironmentEvent::DirectoryCreated {
                path: directory.relative().to_path_buf(),
            }));

        directory
            .path()
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: spec.name.clone(),
                    value: directory.path().display().to_string(),
                }
                .into()
            })
    }
}

/// Resolved variables, in configuration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    root: PathBuf,
    variables: Vec<EnvironmentVariable>,
}

impl Environment {
    /// Output root the path variables were resolved against
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn variables(&self) -> &[EnvironmentVariable] {
        &self.variables
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|var| var.name == name)
            .map(|var| var.value.as_str())
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.variables
            .iter()
            .map(|var| (var.name.clone(), var.value.clone()))
            .collect()
    }

    /// Rebase path variables onto `to`
    ///
    /// Builds that mount the output root somewhere else (a container volume,
    /// for instance) need the same layout under a different prefix. Literal
    /// variables are unchanged.
    #[must_use]
    pub fn relocated(&self, to: &Path) -> Environment {
        let variables = self
            .variables
            .iter()
            .map(|var| {
                let value = match var.kind {
                    EnvVarKind::Path => Path::new(&var.value)
                        .strip_prefix(&self.root)
                        .map_or_else(|_| var.value.clone(), |rest| {
                            to.join(rest).display().to_string()
                        }),
                    EnvVarKind::Literal => var.value.clone(),
                };
                EnvironmentVariable {
                    name: var.name.clone(),
                    value,
                    kind: var.kind,
                }
            })
            .collect();

        Environment {
            root: to.to_path_buf(),
            variables,
        }
    }
}
