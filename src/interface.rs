use std::collections::BTreeSet;

use crate::{
    error::{Error, Result},
    host::{HostRuntime, Module, Value},
    probe::IsolatedProbe,
    registry::ModuleRegistry,
};

/// Modules that legitimately export nothing.
pub const KNOWN_EMPTY_MODULES: &[&str] = &["distutils", "email.mime", "test", "urllib", "wsgiref"];

/// Names the heuristic reports that are not really public.
pub const KNOWN_FALSE_POSITIVES: &[(&str, &str)] = &[("_thread", "exit_thread")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeductionMode {
    /// Aggregation at runtime: anomalies degrade to fewer names.
    #[default]
    Runtime,
    /// Offline generation: anomalies are errors.
    Strict,
}

pub struct InterfaceDeducer<'a> {
    host: &'a dyn HostRuntime,
    registry: &'a ModuleRegistry,
    mode: DeductionMode,
}

impl<'a> InterfaceDeducer<'a> {
    pub fn new(host: &'a dyn HostRuntime, registry: &'a ModuleRegistry) -> Self {
        Self {
            host,
            registry,
            mode: DeductionMode::Runtime,
        }
    }

    pub fn with_mode(mut self, mode: DeductionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DeductionMode {
        self.mode
    }

    /// Public names of `module`. A module the host cannot load has none.
    pub fn deduce(&self, module: &str) -> Result<BTreeSet<String>> {
        let Some(loaded) = self.load(module) else {
            return Ok(BTreeSet::new());
        };

        let candidates: Vec<String> = match loaded.exports() {
            Some(exports) => exports.to_vec(),
            None => loaded
                .attrs()
                .map(|(name, _)| name)
                .filter(|name| !name.starts_with('_'))
                .map(str::to_string)
                .collect(),
        };

        self.finish(module, &loaded, candidates)
    }

    /// Like [`deduce`](Self::deduce), but the candidate names come from a
    /// fresh subordinate process instead of the already-loaded module.
    pub fn deduce_isolated(&self, module: &str, probe: &IsolatedProbe) -> Result<BTreeSet<String>> {
        let candidates = match probe.run(module) {
            Ok(names) => names,
            Err(e) if self.mode == DeductionMode::Runtime => {
                tracing::debug!(module, error = %e, "probe failed; contributing nothing");
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(loaded) = self.load(module) else {
            return Ok(BTreeSet::new());
        };
        self.finish(module, &loaded, candidates)
    }

    /// Whether `value`, found in `module`, was defined by some other
    /// standard module. Submodules of `module` count as `module` itself.
    /// Excluded modules such as `builtins` still count as standard here.
    pub fn is_reexport(&self, module: &str, value: &Value) -> bool {
        let foreign = |other: &str| !is_within(other, module) && self.registry.is_stdlib(other);

        value.as_module().is_some_and(foreign) || value.defined_in().is_some_and(foreign)
    }

    fn load(&self, module: &str) -> Option<std::rc::Rc<Module>> {
        match self.host.load(module) {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                tracing::debug!(module, reason = %e.reason, "module unavailable");
                None
            }
        }
    }

    fn finish(&self, module: &str, loaded: &Module, candidates: Vec<String>) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();

        for name in candidates {
            let Some(value) = loaded.attr(&name) else {
                if self.mode == DeductionMode::Strict {
                    return Err(Error::InterfaceDeduction {
                        module: module.to_string(),
                        reason: format!("exports `{name}` but does not define it"),
                    });
                }
                tracing::warn!(module, name = %name, "exported name is not defined; skipped");
                continue;
            };

            if self.is_reexport(module, value) {
                continue;
            }
            names.insert(name);
        }

        if self.mode == DeductionMode::Strict {
            for (m, name) in KNOWN_FALSE_POSITIVES {
                if *m == module {
                    names.remove(*name);
                }
            }
        }

        if names.is_empty() && !KNOWN_EMPTY_MODULES.contains(&module) {
            if self.mode == DeductionMode::Strict {
                return Err(Error::InterfaceDeduction {
                    module: module.to_string(),
                    reason: "no public names found".to_string(),
                });
            }
            tracing::debug!(module, "module has no public names");
        }

        Ok(names)
    }
}

/// Whether `id` is `module` or one of its submodules.
pub fn is_within(id: &str, module: &str) -> bool {
    id == module
        || id
            .strip_prefix(module)
            .is_some_and(|rest| rest.starts_with('.'))
}
