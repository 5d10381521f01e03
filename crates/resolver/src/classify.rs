//! Module-level / package-level classification

use prefetch_errors::{ConsistencyError, Error};
use prefetch_types::{path_contains, EffectiveDependency, Package, VersionRef};
use std::collections::BTreeMap;

/// Who provides a package-level unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// External module, by effective name
    Module(String),
    /// The root package under resolution
    Main,
    /// Standard library of the toolchain
    Toolchain,
}

/// Package-level unit together with its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPackage {
    pub dependency: EffectiveDependency,
    pub owner: Owner,
}

/// Effective dependencies split by granularity
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub modules: Vec<EffectiveDependency>,
    pub packages: Vec<ClassifiedPackage>,
}

impl Classification {
    /// Number of package-level units provided by the toolchain
    #[must_use]
    pub fn toolchain_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|package| package.owner == Owner::Toolchain)
            .count()
    }
}

/// Partitions effective dependencies and checks modules against packages
pub struct PackageClassifier<'a> {
    root: &'a Package,
}

impl<'a> PackageClassifier<'a> {
    #[must_use]
    pub fn new(root: &'a Package) -> Self {
        Self { root }
    }

    /// Split `effective` into modules and owned packages
    ///
    /// # Errors
    ///
    /// Returns a `ConsistencyError` when a module has no usable version, one
    /// module resolves to two versions, a package has no owner or more than
    /// one, or a package version disagrees with its owner's.
    pub fn classify(&self, effective: Vec<EffectiveDependency>) -> Result<Classification, Error> {
        let (modules, packages): (Vec<_>, Vec<_>) = effective
            .into_iter()
            .partition(|dependency| dependency.kind.is_module());

        let versions = module_versions(&modules)?;

        let packages = packages
            .into_iter()
            .map(|dependency| {
                let owner = self.owner_of(&dependency, &modules)?;
                self.check_version(&dependency, &owner, &versions)?;
                Ok::<_, Error>(ClassifiedPackage { dependency, owner })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Classification { modules, packages })
    }

    fn owner_of(
        &self,
        package: &EffectiveDependency,
        modules: &[EffectiveDependency],
    ) -> Result<Owner, Error> {
        let mut best: Option<(usize, Owner)> = None;
        let mut tied: Vec<Owner> = Vec::new();

        let module_candidates = modules.iter().flat_map(|module| {
            [module.name.as_str(), module.original_name()]
                .into_iter()
                .map(move |prefix| (prefix, Owner::Module(module.name.clone())))
        });
        let main_candidate = std::iter::once((self.root.name.as_str(), Owner::Main));

        for (prefix, owner) in module_candidates.chain(main_candidate) {
            if !path_contains(prefix, &package.name) {
                continue;
            }
            match &best {
                Some((length, current)) if prefix.len() == *length => {
                    if *current != owner && !tied.contains(&owner) {
                        tied.push(owner);
                    }
                }
                Some((length, _)) if prefix.len() < *length => {}
                _ => {
                    best = Some((prefix.len(), owner));
                    tied.clear();
                }
            }
        }

        match best {
            Some((_, owner)) if tied.is_empty() => Ok(owner),
            Some((_, owner)) => {
                let mut candidates: Vec<String> = std::iter::once(owner)
                    .chain(tied)
                    .map(|owner| self.describe(&owner))
                    .collect();
                candidates.sort();
                Err(ConsistencyError::AmbiguousOwner {
                    package: package.name.clone(),
                    candidates: candidates.join(", "),
                }
                .into())
            }
            None => match &package.version {
                None => Ok(Owner::Toolchain),
                Some(version) => Err(ConsistencyError::OrphanPackage {
                    name: package.name.clone(),
                    version: version.clone(),
                }
                .into()),
            },
        }
    }

    fn check_version(
        &self,
        package: &EffectiveDependency,
        owner: &Owner,
        versions: &BTreeMap<&str, &str>,
    ) -> Result<(), Error> {
        let (owner_name, expected) = match owner {
            Owner::Toolchain => return Ok(()),
            Owner::Main => match self.root.version.as_deref() {
                Some(version) => (self.root.name.as_str(), version),
                None => return Ok(()),
            },
            Owner::Module(name) => match versions.get(name.as_str()) {
                Some(version) => (name.as_str(), *version),
                None => return Err(Error::internal(format!("unindexed module {name}"))),
            },
        };

        if package.version.as_deref() == Some(expected) {
            return Ok(());
        }
        Err(ConsistencyError::VersionMismatch {
            package: package.name.clone(),
            package_version: package
                .version
                .clone()
                .unwrap_or_else(|| "<none>".to_string()),
            module: owner_name.to_string(),
            module_version: expected.to_string(),
        }
        .into())
    }

    fn describe(&self, owner: &Owner) -> String {
        match owner {
            Owner::Module(name) => name.clone(),
            Owner::Main => format!("{} (main)", self.root.name),
            Owner::Toolchain => "toolchain".to_string(),
        }
    }
}

/// Effective version per module, after checking every module has one
fn module_versions(modules: &[EffectiveDependency]) -> Result<BTreeMap<&str, &str>, Error> {
    let mut versions: BTreeMap<&str, &str> = BTreeMap::new();
    for module in modules {
        let version = module
            .version
            .as_deref()
            .ok_or_else(|| ConsistencyError::MissingVersion {
                name: module.name.clone(),
                kind: module.kind.to_string(),
            })?;
        VersionRef::parse(&module.name, version)?;

        if let Some(previous) = versions.insert(&module.name, version) {
            if previous != version {
                return Err(ConsistencyError::ConflictingModuleVersions {
                    name: module.name.clone(),
                    first: previous.to_string(),
                    second: version.to_string(),
                }
                .into());
            }
        }
    }
    Ok(versions)
}
