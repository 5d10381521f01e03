//! Module ownership graph

use crate::classify::{Classification, Owner};
use std::collections::BTreeMap;

/// One module-level dependency and the package-level units it provides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleNode {
    /// Effective module name
    pub name: String,
    /// Effective version
    pub version: Option<String>,
    /// Name before a renaming replace directive, if any
    pub original_name: Option<String>,
    /// Package-level units owned by this module, sorted
    pub packages: Vec<String>,
}

impl ModuleNode {
    /// Whether some package-level unit was attributed to this module
    #[must_use]
    pub fn is_used(&self) -> bool {
        !self.packages.is_empty()
    }
}

/// Which units come from which module
///
/// Built from a validated [`Classification`]; every package-level unit
/// appears under exactly one owner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleGraph {
    modules: BTreeMap<String, ModuleNode>,
    main_packages: Vec<String>,
    toolchain_packages: Vec<String>,
}

impl ModuleGraph {
    /// Index `classification` by owner
    #[must_use]
    pub fn from_classification(classification: &Classification) -> Self {
        let mut graph = Self::default();

        for module in &classification.modules {
            graph
                .modules
                .entry(module.name.clone())
                .or_insert_with(|| ModuleNode {
                    name: module.name.clone(),
                    version: module.version.clone(),
                    original_name: module
                        .is_renamed()
                        .then(|| module.original_name().to_string()),
                    packages: Vec::new(),
                });
        }

        for package in &classification.packages {
            let name = package.dependency.name.clone();
            match &package.owner {
                Owner::Module(module) => {
                    if let Some(node) = graph.modules.get_mut(module) {
                        node.packages.push(name);
                    }
                }
                Owner::Main => graph.main_packages.push(name),
                Owner::Toolchain => graph.toolchain_packages.push(name),
            }
        }

        for node in graph.modules.values_mut() {
            node.packages.sort();
            node.packages.dedup();
        }
        graph.main_packages.sort();
        graph.main_packages.dedup();
        graph.toolchain_packages.sort();
        graph.toolchain_packages.dedup();

        graph
    }

    /// Modules ordered by name
    pub fn modules(&self) -> impl Iterator<Item = &ModuleNode> {
        self.modules.values()
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleNode> {
        self.modules.get(name)
    }

    /// Module providing `package`, if an external module does
    #[must_use]
    pub fn owner_of(&self, package: &str) -> Option<&ModuleNode> {
        self.modules
            .values()
            .find(|node| node.packages.iter().any(|name| name == package))
    }

    /// Units of the root package itself
    #[must_use]
    pub fn main_packages(&self) -> &[String] {
        &self.main_packages
    }

    /// Units provided by the toolchain
    #[must_use]
    pub fn toolchain_packages(&self) -> &[String] {
        &self.toolchain_packages
    }

    /// Modules no package-level unit was attributed to
    pub fn unused_modules(&self) -> impl Iterator<Item = &ModuleNode> {
        self.modules.values().filter(|node| !node.is_used())
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}
