use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Resolver domain events for a prefetch session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverEvent {
    /// Session started for a main package
    SessionStarted {
        session_id: String,
        package: String,
        dependencies: usize,
        directives: usize,
    },

    /// Replace directives applied to the dependency list
    DirectivesApplied { replaced: usize, renamed: usize },

    /// Records split into module-level and package-level units
    Classified {
        modules: usize,
        packages: usize,
        toolchain: usize,
    },

    /// Manifest assembled
    ManifestReady {
        digest: String,
        modules: usize,
        packages: usize,
    },

    SessionCompleted {
        session_id: String,
        fetched: usize,
        duration_ms: u64,
    },

    SessionFailed {
        session_id: String,
        failure: FailureContext,
    },
}
