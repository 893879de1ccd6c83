use std::collections::BTreeSet;

use crate::{
    data::{ModuleTable, NameTable},
    version::HostVersion,
};

/// Modules and names deprecated as of a version floor.
///
/// Entries accumulate: whatever is deprecated at `V` stays deprecated at every
/// version at or after `V`, so each query unions every floor `<=` the asked
/// version.
#[derive(Debug, Clone, Default)]
pub struct DeprecationTable {
    modules: ModuleTable,
    names: NameTable,
}

impl DeprecationTable {
    pub fn new(modules: ModuleTable, names: NameTable) -> Self {
        Self { modules, names }
    }

    pub fn deprecated_modules(&self, version: HostVersion) -> BTreeSet<String> {
        self.modules
            .range(..=version)
            .flat_map(|(_, modules)| modules.iter().cloned())
            .collect()
    }

    /// Deprecated names within `module`. Unknown modules yield an empty set.
    pub fn deprecated_names(&self, module: &str, version: HostVersion) -> BTreeSet<String> {
        self.names
            .range(..=version)
            .filter_map(|(_, per_module)| per_module.get(module))
            .flat_map(|names| names.iter().cloned())
            .collect()
    }

    pub fn is_module_deprecated(&self, module: &str, version: HostVersion) -> bool {
        self.modules
            .range(..=version)
            .any(|(_, modules)| modules.contains(module))
    }

    /// Every module with at least one deprecated-name record at any version.
    pub fn modules_with_deprecated_names(&self) -> BTreeSet<String> {
        self.names
            .values()
            .flat_map(|per_module| per_module.keys().cloned())
            .collect()
    }
}
