use std::collections::{BTreeMap, BTreeSet};

use crate::{
    host::Value,
    merge::Aggregator,
    symbols::{Binding, Namespace},
};

#[derive(Debug, Clone)]
pub struct Contribution {
    pub module: String,
    pub binding: Binding,
}

/// Entries inserted by one aggregation, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    entries: BTreeMap<String, Contribution>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: String, module: String, binding: Binding) {
        self.entries.insert(name, Contribution { module, binding });
    }

    pub fn get(&self, name: &str) -> Option<&Contribution> {
        self.entries.get(name)
    }

    /// The module that contributed `name`.
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|c| c.module.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every module that contributed at least one entry.
    pub fn modules(&self) -> BTreeSet<String> {
        self.entries.values().map(|c| c.module.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Contribution)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseOptions {
    /// Evict every aggregatable module afterwards so the next aggregation
    /// re-runs module initialization.
    pub purge_cache: bool,
}

fn still_bound(current: &Binding, recorded: &Binding) -> bool {
    if current.same(recorded) {
        return true;
    }
    match (current.peek(), recorded.peek()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Remove from `namespace` every recorded entry that is still bound to the
/// recorded value. Returns the removed names.
///
/// A name the aggregation overwrote is left absent, not restored. Values
/// match by identity, or by equality when both sides are already realized,
/// so reversal never forces a load.
pub fn reverse<N>(namespace: &mut N, provenance: &Provenance) -> Vec<String>
where
    N: Namespace + ?Sized,
{
    let mut removed = Vec::new();

    for (name, contribution) in provenance.iter() {
        let Some(current) = namespace.get(name) else {
            continue;
        };
        if !still_bound(current, &contribution.binding) {
            tracing::trace!(name, "rebound since aggregation; kept");
            continue;
        }
        namespace.remove(name);
        removed.push(name.to_string());
    }

    removed
}

/// Every value any aggregatable module contributes, by identity.
///
/// Module objects are matched by canonical name, since hosts may hand out a
/// new object for the same module.
#[derive(Debug, Default)]
pub struct OriginIndex {
    addrs: BTreeSet<usize>,
    modules: BTreeSet<String>,
    // holds the indexed values alive so their addresses stay unique
    values: Vec<Value>,
}

impl OriginIndex {
    /// Load every aggregatable module and index its contributions,
    /// deprecated ones included.
    pub fn build(aggregator: &Aggregator) -> Self {
        let mut index = Self::default();

        for module in aggregator.registry().aggregatable() {
            for binding in aggregator.eager_symbols(module, true).into_values() {
                if let Some(value) = binding.peek() {
                    index.insert(value.clone());
                }
            }
        }

        tracing::debug!(values = index.len(), "origin index built");
        index
    }

    pub fn insert(&mut self, value: Value) {
        if let Some(name) = value.as_module() {
            self.modules.insert(name.to_string());
        }
        if self.addrs.insert(value.addr()) {
            self.values.push(value);
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.addrs.contains(&value.addr()) || value.as_module().is_some_and(|m| self.modules.contains(m))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Remove every entry of `namespace` whose value came from any aggregatable
/// module. Lazy entries are realized to be checked.
pub fn reverse_by_origin<N>(namespace: &mut N, index: &OriginIndex) -> Vec<String>
where
    N: Namespace + ?Sized,
{
    let mut removed = Vec::new();

    for name in namespace.names() {
        let hit = namespace
            .get(&name)
            .and_then(|b| b.value().ok())
            .is_some_and(|v| index.contains(&v));
        if hit {
            namespace.remove(&name);
            removed.push(name);
        }
    }

    removed
}

impl Aggregator {
    /// [`reverse`] and optionally purge the host cache.
    pub fn reverse<N>(&self, namespace: &mut N, provenance: &Provenance, options: ReverseOptions) -> Vec<String>
    where
        N: Namespace + ?Sized,
    {
        let removed = reverse(namespace, provenance);
        if options.purge_cache {
            let evicted = self.purge_cache();
            tracing::debug!(evicted = evicted.len(), "host cache purged");
        }
        removed
    }

    pub fn origin_index(&self) -> OriginIndex {
        OriginIndex::build(self)
    }
}
