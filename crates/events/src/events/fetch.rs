use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Fetch domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchEvent {
    /// Pool started with a number of modules and workers
    BatchStarted { modules: usize, workers: usize },

    Started {
        module: String,
        version: String,
        attempt: u32,
    },

    /// Transient failure, another attempt follows after `delay_ms`
    Retrying {
        module: String,
        version: String,
        attempt: u32,
        delay_ms: u64,
        failure: FailureContext,
    },

    Completed {
        module: String,
        version: String,
        path: PathBuf,
    },

    Failed {
        module: String,
        version: String,
        failure: FailureContext,
    },

    /// Staged results moved into the cache
    StagingCommitted { modules: usize, cache_dir: PathBuf },

    /// Staged results removed after a failure
    StagingDiscarded { staging_dir: PathBuf },
}
