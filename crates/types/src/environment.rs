//! Environment variable records for isolated toolchain caches

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an environment variable value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvVarKind {
    /// Relative to the sandboxed output root; resolved and created
    Path,
    /// Used verbatim
    Literal,
}

impl fmt::Display for EnvVarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Literal => write!(f, "literal"),
        }
    }
}

/// Configured environment variable, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarSpec {
    pub name: String,
    pub value: String,
    pub kind: EnvVarKind,
}

impl EnvVarSpec {
    pub fn path(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: EnvVarKind::Path,
        }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: EnvVarKind::Literal,
        }
    }
}

/// Resolved environment variable handed to a build process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
    pub kind: EnvVarKind,
}
