//! Path confinement error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SandboxError {
    #[error("path {path} escapes sandbox root {root} (resolves to {resolved})")]
    Escape {
        path: String,
        root: String,
        resolved: String,
    },

    #[error("path not found inside sandbox: {path}")]
    NotFound { path: String },

    #[error("invalid sandbox root {path}: {reason}")]
    InvalidRoot { path: String, reason: String },

    #[error("I/O error while confining {path}: {message}")]
    Io { path: String, message: String },
}

impl SandboxError {
    /// Convert an `io::Error` raised while resolving `path`
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                path: path.display().to_string(),
            },
            _ => Self::Io {
                path: path.display().to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl UserFacingError for SandboxError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Escape { .. } => Some(
                "Remove symbolic links or `..` segments that point outside the project directory.",
            ),
            Self::InvalidRoot { .. } => {
                Some("Pass an existing, absolute directory as the project or output root.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Escape { .. } => "sandbox.escape",
            Self::NotFound { .. } => "sandbox.not_found",
            Self::InvalidRoot { .. } => "sandbox.invalid_root",
            Self::Io { .. } => "sandbox.io",
        };
        Some(code)
    }
}
