#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for prefetch
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/prefetch/config.toml)
//! - Environment variables

pub mod constants;
pub mod resources_semaphore;

use prefetch_errors::{ConfigError, Error};
use prefetch_types::{EnvVarKind, EnvVarSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_parallel_fetches")]
    pub parallel_fetches: usize, // 0 = auto-detect
}

/// Network configuration for fetchers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

/// Variables exported to the build process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_variables")]
    pub variables: Vec<EnvVarSpec>,
}

/// Locations inside the output root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            parallel_fetches: default_parallel_fetches(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            variables: default_variables(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            staging_dir: default_staging_dir(),
        }
    }
}

// Default value functions for serde
fn default_parallel_fetches() -> usize {
    4
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_variables() -> Vec<EnvVarSpec> {
    vec![
        EnvVarSpec::path("GOCACHE", constants::GO_ROOT_DIR),
        EnvVarSpec::path("GOMODCACHE", constants::GO_MOD_CACHE_DIR),
        EnvVarSpec::path("GOPATH", constants::GO_ROOT_DIR),
        EnvVarSpec::literal("GOSUMDB", "off"),
    ]
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(constants::CACHE_DOWNLOAD_DIR)
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(constants::STAGING_DIR)
}

impl NetworkConfig {
    /// Per-fetch timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Delay before the first retry
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Upper bound on any retry delay
    #[must_use]
    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::CONFIG_DIR_NAME)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // PREFETCH_PARALLEL_FETCHES
        if let Ok(fetches) = std::env::var("PREFETCH_PARALLEL_FETCHES") {
            self.general.parallel_fetches =
                fetches.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PREFETCH_PARALLEL_FETCHES".to_string(),
                    value: fetches,
                })?;
        }

        // PREFETCH_FETCH_RETRIES
        if let Ok(retries) = std::env::var("PREFETCH_FETCH_RETRIES") {
            self.network.retries = retries.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PREFETCH_FETCH_RETRIES".to_string(),
                value: retries,
            })?;
        }

        // PREFETCH_FETCH_TIMEOUT
        if let Ok(timeout) = std::env::var("PREFETCH_FETCH_TIMEOUT") {
            self.network.timeout = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PREFETCH_FETCH_TIMEOUT".to_string(),
                value: timeout,
            })?;
        }

        Ok(())
    }

    /// Check invariants that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for empty or duplicate variable names,
    /// absolute path-kind values, or absolute cache/staging directories.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for var in &self.environment.variables {
            if var.name.is_empty() {
                return Err(ConfigError::Invalid {
                    message: "environment variable with empty name".to_string(),
                }
                .into());
            }
            if !seen.insert(var.name.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("environment variable {} defined twice", var.name),
                }
                .into());
            }
            if var.kind == EnvVarKind::Path && Path::new(&var.value).is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: format!("environment.variables.{}", var.name),
                    value: var.value.clone(),
                }
                .into());
            }
        }

        for (field, path) in [
            ("paths.cache_dir", &self.paths.cache_dir),
            ("paths.staging_dir", &self.paths.staging_dir),
        ] {
            if path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: path.display().to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Number of concurrent fetch workers
    #[must_use]
    pub fn fetch_workers(&self) -> usize {
        calculate_fetch_workers(self.general.parallel_fetches)
    }
}

/// Calculate fetch workers based on CPU count
#[must_use]
pub fn calculate_fetch_workers(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Fetching is I/O bound, so allow more workers than cores
        (num_cpus::get() * 2).max(1)
    }
}
