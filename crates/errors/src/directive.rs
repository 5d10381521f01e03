//! Replace directive error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum DirectiveError {
    #[error("chained replace directive: {kind} {name} is replaced by {replacement}, which is itself replaced")]
    Chained {
        name: String,
        kind: String,
        replacement: String,
    },

    #[error("self-referential replace directive: {kind} {name}@{version} replaces itself")]
    SelfReferential {
        name: String,
        kind: String,
        version: String,
    },

    #[error("conflicting replace directives for {kind} {name}: {first} vs {second}")]
    Conflicting {
        name: String,
        kind: String,
        first: String,
        second: String,
    },

    #[error("duplicate replace directive for {kind} {name}")]
    Duplicate { name: String, kind: String },

    #[error("replace directive for {name} changes kind from {source_kind} to {replacement_kind}")]
    KindMismatch {
        name: String,
        source_kind: String,
        replacement_kind: String,
    },

    #[error("replacement for {name} has no version")]
    MissingReplacementVersion { name: String },

    #[error("invalid dependency record {name}: {message}")]
    InvalidRecord { name: String, message: String },
}

impl UserFacingError for DirectiveError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Chained { .. } => {
                Some("Point the replace directive directly at the final replacement.")
            }
            Self::Conflicting { .. } | Self::Duplicate { .. } => {
                Some("Keep a single replace directive per dependency.")
            }
            _ => Some("Fix the replace directive in the project manifest."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Chained { .. } => "directive.chained",
            Self::SelfReferential { .. } => "directive.self_referential",
            Self::Conflicting { .. } => "directive.conflicting",
            Self::Duplicate { .. } => "directive.duplicate",
            Self::KindMismatch { .. } => "directive.kind_mismatch",
            Self::MissingReplacementVersion { .. } => "directive.missing_replacement_version",
            Self::InvalidRecord { .. } => "directive.invalid_record",
        };
        Some(code)
    }
}
