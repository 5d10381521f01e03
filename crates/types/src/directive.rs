//! Side-list replace directives

use crate::dependency::{DependencyId, DependencyKind, ReplacementTarget};
use serde::{Deserialize, Serialize};

/// Replace directive supplied apart from the dependency records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceDirective {
    pub source: DependencyId,
    pub replacement: ReplacementTarget,
}

impl ReplaceDirective {
    /// Directive redirecting `source` of `kind` to `replacement`@`version`
    pub fn new(
        source: impl Into<String>,
        kind: DependencyKind,
        replacement: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            source: DependencyId::new(source, kind),
            replacement: ReplacementTarget::new(replacement, kind, version),
        }
    }

    #[must_use]
    pub fn is_rename(&self) -> bool {
        self.source.name != self.replacement.name
    }
}
