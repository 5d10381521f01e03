//! Replace directive resolution

use prefetch_errors::{ConsistencyError, DirectiveError, Error};
use prefetch_types::{
    path_contains, validate_dependency_name, Dependency, DependencyId, DependencyKind,
    EffectiveDependency, RawDependency, ReplaceDirective, ReplacementTarget,
};
use std::collections::{BTreeMap, HashSet};

/// Applies replace directives to a dependency list
///
/// Directives come from two places: the `replaces` field embedded in each
/// record, and a side list keyed by the replaced dependency. Both are applied
/// in a single pass; a replacement is never replaced again.
#[derive(Debug, Clone, Default)]
pub struct ReplaceResolver {
    directives: BTreeMap<DependencyId, ReplacementTarget>,
}

impl ReplaceResolver {
    /// Resolver with no side-list directives
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver applying `directives` on top of embedded replacements
    ///
    /// Identical directives collapse into one.
    ///
    /// # Errors
    ///
    /// Returns `DirectiveError::InvalidRecord` for a name with dot segments,
    /// `DirectiveError::Duplicate` when one dependency has two
    /// different directives, `KindMismatch` when a directive changes the
    /// kind, `Chained` when a target is itself replaced, and
    /// `ConsistencyError::OverlappingDirectives` when a module-level and a
    /// package-level directive cover the same names.
    pub fn with_directives(directives: Vec<ReplaceDirective>) -> Result<Self, Error> {
        let mut table: BTreeMap<DependencyId, ReplacementTarget> = BTreeMap::new();

        for directive in directives {
            validate_dependency_name(&directive.source.name)?;
            validate_dependency_name(&directive.replacement.name)?;
            if directive.source.kind != directive.replacement.kind {
                return Err(DirectiveError::KindMismatch {
                    name: directive.source.name.clone(),
                    source_kind: directive.source.kind.to_string(),
                    replacement_kind: directive.replacement.kind.to_string(),
                }
                .into());
            }
            match table.get(&directive.source) {
                Some(existing) if *existing == directive.replacement => {}
                Some(_) => {
                    return Err(DirectiveError::Duplicate {
                        name: directive.source.name.clone(),
                        kind: directive.source.kind.to_string(),
                    }
                    .into());
                }
                None => {
                    table.insert(directive.source, directive.replacement);
                }
            }
        }

        for (source, target) in &table {
            let target_id = target.id();
            if target_id != *source && table.contains_key(&target_id) {
                return Err(chained(source, target));
            }
        }

        check_overlap(table.keys().map(|source| (source.name.as_str(), source.kind)))?;

        Ok(Self { directives: table })
    }

    /// Side-list directives, ordered by source
    pub fn directives(&self) -> impl Iterator<Item = (&DependencyId, &ReplacementTarget)> {
        self.directives.iter()
    }

    /// Resolve every record to its effective identity
    ///
    /// The output has one entry per input record, in input order. Records
    /// without a directive keep their own name and version.
    ///
    /// # Errors
    ///
    /// Returns a `DirectiveError` for malformed, conflicting, chained or
    /// self-referential directives (a rename onto any directive source is
    /// chained, even a version-only one), and
    /// `ConsistencyError::OverlappingDirectives` when embedded module-level
    /// and package-level directives cover the same names.
    pub fn resolve(&self, records: &[RawDependency]) -> Result<Vec<EffectiveDependency>, Error> {
        let mut resolved = Vec::with_capacity(records.len());
        for raw in records {
            let dependency = Dependency::from_raw(raw)?;
            let target = self.target_for(&dependency)?;
            resolved.push((dependency, target));
        }

        // Every directive source counts, version-only ones included.
        let replaced: HashSet<DependencyId> = resolved
            .iter()
            .filter(|(_, target)| target.is_some())
            .map(|(dependency, _)| dependency.id())
            .chain(self.directives.keys().cloned())
            .collect();

        for (dependency, target) in &resolved {
            if let Some(target) = target {
                let target_id = target.id();
                if target_id != dependency.id() && replaced.contains(&target_id) {
                    return Err(chained(&dependency.id(), target));
                }
            }
        }

        check_overlap(
            resolved
                .iter()
                .filter(|(_, target)| target.is_some())
                .map(|(dependency, _)| (dependency.name.as_str(), dependency.kind)),
        )?;

        let effective: Vec<EffectiveDependency> = resolved
            .into_iter()
            .map(|(dependency, target)| match target {
                Some(target) => EffectiveDependency::replaced(dependency, target),
                None => EffectiveDependency::unreplaced(dependency),
            })
            .collect();

        for dependency in effective.iter().filter(|d| d.is_replaced()) {
            tracing::debug!(
                name = %dependency.original_name(),
                replacement = %dependency.name,
                version = dependency.version.as_deref().unwrap_or_default(),
                "applied replace directive"
            );
        }

        Ok(effective)
    }

    fn target_for(&self, dependency: &Dependency) -> Result<Option<ReplacementTarget>, Error> {
        let side = self.directives.get(&dependency.id());
        let target = match (dependency.replaced_by.as_ref(), side) {
            (Some(embedded), Some(side)) if embedded != side => {
                return Err(DirectiveError::Conflicting {
                    name: dependency.name.clone(),
                    kind: dependency.kind.to_string(),
                    first: embedded.to_string(),
                    second: side.to_string(),
                }
                .into());
            }
            (Some(embedded), _) => Some(embedded.clone()),
            (None, side) => side.cloned(),
        };

        if let Some(target) = &target {
            if target.name == dependency.name
                && dependency.version.as_deref() == Some(target.version.as_str())
            {
                return Err(DirectiveError::SelfReferential {
                    name: dependency.name.clone(),
                    kind: dependency.kind.to_string(),
                    version: target.version.clone(),
                }
                .into());
            }
        }

        Ok(target)
    }
}

fn chained(source: &DependencyId, target: &ReplacementTarget) -> Error {
    DirectiveError::Chained {
        name: source.name.clone(),
        kind: source.kind.to_string(),
        replacement: target.name.clone(),
    }
    .into()
}

/// Reject a module-level directive whose module contains a package-level
/// directive's package
fn check_overlap<'a>(
    sources: impl IntoIterator<Item = (&'a str, DependencyKind)>,
) -> Result<(), Error> {
    let (modules, packages): (Vec<_>, Vec<_>) =
        sources.into_iter().partition(|(_, kind)| kind.is_module());

    for (module, _) in &modules {
        if let Some((package, _)) = packages
            .iter()
            .find(|(package, _)| path_contains(module, package))
        {
            return Err(ConsistencyError::OverlappingDirectives {
                module: (*module).to_string(),
                package: (*package).to_string(),
            }
            .into());
        }
    }
    Ok(())
}
