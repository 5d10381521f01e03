use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment construction events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    VariableResolved {
        name: String,
        value: String,
        kind: String,
    },

    /// Directory backing a path variable created (or already present)
    DirectoryCreated { path: PathBuf },

    Built { variables: usize },
}
