//! Fetch collaborator error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum FetchError {
    #[error("transient failure fetching {name}@{version}: {message}")]
    Transient {
        name: String,
        version: String,
        message: String,
    },

    #[error("failed to fetch {name}@{version}: {message}")]
    Failed {
        name: String,
        version: String,
        message: String,
    },

    #[error("giving up on {name}@{version} after {attempts} attempts: {message}")]
    RetriesExhausted {
        name: String,
        version: String,
        attempts: u32,
        message: String,
    },

    #[error("fetch of {name} timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },
}

impl FetchError {
    /// Whether the fetch layer may try the same dependency again
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }
}

impl UserFacingError for FetchError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Transient { .. } | Self::Timeout { .. } | Self::RetriesExhausted { .. } => {
                Some("Check network connectivity to the module proxy and retry.")
            }
            Self::Failed { .. } => Some("Verify that the dependency and version exist."),
        }
    }

    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Transient { .. } => "fetch.transient",
            Self::Failed { .. } => "fetch.failed",
            Self::RetriesExhausted { .. } => "fetch.retries_exhausted",
            Self::Timeout { .. } => "fetch.timeout",
        };
        Some(code)
    }
}
