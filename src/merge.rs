use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
    sync::Arc,
};

use crate::{
    data::StaticData,
    error::{Error, Result, Unavailable},
    evict::evict_module,
    host::HostRuntime,
    interface::InterfaceDeducer,
    priority::{fold_order, Priorities},
    provenance::Provenance,
    registry::ModuleRegistry,
    symbols::{is_identifier, Binding, Namespace, SymbolTable},
    version::HostVersion,
};

/// How aggregated names meet names already bound in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertStrategy {
    /// Keep whatever the destination already binds.
    #[default]
    FillMissing,
    /// Replace existing bindings. Reversal leaves such names absent.
    Override,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub lazy: bool,
    pub protect_reserved_names: bool,
    pub include_deprecated: bool,
    pub priorities: Priorities,
    /// Modules left out entirely.
    pub ignore: BTreeSet<String>,
    pub strategy: InsertStrategy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            lazy: true,
            protect_reserved_names: true,
            include_deprecated: false,
            priorities: Priorities::default(),
            ignore: BTreeSet::new(),
            strategy: InsertStrategy::default(),
        }
    }
}

/// A merged table plus the module each entry came from.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub table: SymbolTable,
    pub origins: BTreeMap<String, String>,
}

/// Aggregates the public symbols of every aggregatable module of one host.
pub struct Aggregator {
    host: Rc<dyn HostRuntime>,
    registry: ModuleRegistry,
    data: Arc<StaticData>,
    version: HostVersion,
}

impl Aggregator {
    /// An aggregator over the bundled static tables.
    pub fn new(host: Rc<dyn HostRuntime>, registry: ModuleRegistry) -> Result<Self> {
        Ok(Self::with_parts(host, registry, StaticData::builtin()?))
    }

    pub fn with_parts(host: Rc<dyn HostRuntime>, registry: ModuleRegistry, data: Arc<StaticData>) -> Self {
        let version = host.version();
        Self {
            host,
            registry,
            data,
            version,
        }
    }

    /// Query static data as of `version` instead of the host's own.
    pub fn with_version(mut self, version: HostVersion) -> Self {
        self.version = version;
        self
    }

    pub fn host(&self) -> &Rc<dyn HostRuntime> {
        &self.host
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn data(&self) -> &StaticData {
        &self.data
    }

    /// The running host version; the default for every version-indexed query.
    pub fn version(&self) -> HostVersion {
        self.version
    }

    pub fn deprecated_modules(&self, version: Option<HostVersion>) -> BTreeSet<String> {
        self.data
            .deprecations
            .deprecated_modules(version.unwrap_or(self.version))
    }

    pub fn deprecated_names(&self, module: &str, version: Option<HostVersion>) -> BTreeSet<String> {
        self.data
            .deprecations
            .deprecated_names(module, version.unwrap_or(self.version))
    }

    /// Like [`deprecated_names`](Self::deprecated_names), but a module the
    /// registry does not know is an error.
    pub fn deprecated_names_strict(&self, module: &str, version: Option<HostVersion>) -> Result<BTreeSet<String>> {
        if !self.registry.is_known(module) {
            return Err(Error::UnknownModule(module.to_string()));
        }
        Ok(self.deprecated_names(module, version))
    }

    /// Public names recorded in the static table.
    pub fn public_names(&self, module: &str, version: Option<HostVersion>) -> Result<BTreeSet<String>> {
        self.data
            .public_names
            .names(module, version.unwrap_or(self.version))
    }

    /// The public interface used for eager aggregation.
    ///
    /// The static table answers when it records `module` for the running
    /// version. Other modules are deduced live, which loads them.
    pub fn interface(&self, module: &str) -> BTreeSet<String> {
        if let Some(names) = self.data.public_names.lookup(module, self.version) {
            return names.clone();
        }

        InterfaceDeducer::new(self.host.as_ref(), &self.registry)
            .deduce(module)
            .unwrap_or_else(|e| {
                tracing::debug!(module, error = %e, "interface deduction failed");
                BTreeSet::new()
            })
    }

    /// The symbols one module contributes.
    ///
    /// Lazy contributions come from the static table alone so nothing is
    /// loaded until a binding is used: a version without a table is
    /// `UnknownVersion`, and a module the table does not record contributes
    /// nothing.
    pub fn module_symbols(&self, module: &str, lazy: bool, include_deprecated: bool) -> Result<SymbolTable> {
        if !lazy {
            return Ok(self.eager_symbols(module, include_deprecated));
        }

        let mut names = self.data.public_names.names(module, self.version)?;
        if !include_deprecated {
            self.drop_deprecated(module, &mut names);
        }

        Ok(names
            .into_iter()
            .map(|name| {
                let binding = deferred_attr(self.host.clone(), module.to_string(), name.clone());
                (name, binding)
            })
            .collect())
    }

    pub(crate) fn eager_symbols(&self, module: &str, include_deprecated: bool) -> SymbolTable {
        let mut names = self.interface(module);
        if !include_deprecated {
            self.drop_deprecated(module, &mut names);
        }

        let loaded = match self.host.load(module) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::debug!(module, reason = %e.reason, "module unavailable");
                return SymbolTable::new();
            }
        };

        let mut table = SymbolTable::new();
        for name in names {
            match loaded.attr(&name) {
                Some(value) => {
                    table.insert(name, Binding::Eager(value.clone()));
                }
                None => tracing::debug!(module, name = %name, "public name missing at runtime"),
            }
        }
        table
    }

    fn drop_deprecated(&self, module: &str, names: &mut BTreeSet<String>) {
        for name in self.deprecated_names(module, None) {
            names.remove(&name);
        }
    }

    /// Registry modules minus ignored and (unless asked for) deprecated ones.
    pub fn candidate_modules(&self, options: &MergeOptions) -> BTreeSet<String> {
        let deprecated = if options.include_deprecated {
            BTreeSet::new()
        } else {
            self.deprecated_modules(None)
        };

        self.registry
            .aggregatable()
            .iter()
            .filter(|id| !options.ignore.contains(*id) && !deprecated.contains(*id))
            .cloned()
            .collect()
    }

    /// Fold `modules` in ascending `(priority, id)` order, later modules
    /// overwriting earlier ones, and remember where each entry came from.
    pub fn merge_tracked<I, S>(&self, modules: I, priorities: &Priorities, options: &MergeOptions) -> Result<Merged>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if options.lazy && !self.data.public_names.has_version(self.version) {
            return Err(Error::UnknownVersion {
                table: "public names",
                version: self.version,
            });
        }

        let mut merged = Merged::default();

        for module in fold_order(modules, priorities) {
            let contribution = self.module_symbols(&module, options.lazy, options.include_deprecated)?;
            for (name, binding) in contribution {
                merged.origins.insert(name.clone(), module.clone());
                merged.table.insert(name, binding);
            }
        }

        Ok(merged)
    }

    pub fn merge<I, S>(&self, modules: I, priorities: &Priorities, options: &MergeOptions) -> Result<SymbolTable>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.merge_tracked(modules, priorities, options)?.table)
    }

    /// Every candidate module merged under the configured priorities.
    pub fn symbols(&self, options: &MergeOptions) -> Result<SymbolTable> {
        self.merge(self.candidate_modules(options), &options.priorities, options)
    }

    /// Merge into `namespace` and record what was inserted. Nothing is
    /// inserted when the merge fails.
    pub fn import_into<N>(&self, namespace: &mut N, options: &MergeOptions) -> Result<Provenance>
    where
        N: Namespace + ?Sized,
    {
        let merged = self.merge_tracked(self.candidate_modules(options), &options.priorities, options)?;
        let reserved = &self.data.reserved;
        let mut provenance = Provenance::new();

        for (name, binding) in merged.table {
            if options.protect_reserved_names && reserved.is_protected(&name) {
                tracing::trace!(name = %name, "reserved name left untouched");
                continue;
            }
            if !is_identifier(&name, reserved) {
                let err = Error::InvalidIdentifier { name };
                tracing::debug!(error = %err, "skipped");
                continue;
            }
            if options.strategy == InsertStrategy::FillMissing && namespace.contains(&name) {
                continue;
            }

            let Some(module) = merged.origins.get(&name) else {
                continue;
            };
            provenance.record(name.clone(), module.clone(), binding.clone());
            namespace.insert(name, binding);
        }

        tracing::debug!(inserted = provenance.len(), "aggregation imported");
        Ok(provenance)
    }

    /// Evict every aggregatable module (with aliases, submodules and
    /// ancestors) from the host cache.
    pub fn purge_cache(&self) -> Vec<String> {
        let mut evicted = BTreeSet::new();
        for id in self.registry.aggregatable() {
            if self.host.is_loaded(id) {
                evicted.extend(evict_module(self.host.as_ref(), &self.registry, id));
            }
        }
        evicted.into_iter().collect()
    }
}

fn deferred_attr(host: Rc<dyn HostRuntime>, module: String, name: String) -> Binding {
    Binding::lazy(move || {
        let loaded = host.load(&module)?;
        loaded
            .attr(&name)
            .cloned()
            .ok_or_else(|| Unavailable::new(module.as_str(), format!("has no attribute `{name}`")))
    })
}
