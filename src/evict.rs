use std::collections::BTreeSet;

use crate::{host::HostRuntime, interface::is_within, registry::ModuleRegistry};

/// Evict `id` from the host cache together with everything loaded alongside
/// it: known submodules, ancestor packages, and the canonical module behind
/// any of those that was loaded under an alias. Returns the evicted ids in
/// order.
///
/// The next load of `id` re-runs initialization for all of them.
pub fn evict_module(host: &dyn HostRuntime, registry: &ModuleRegistry, id: &str) -> Vec<String> {
    let known = registry.known();
    let mut targets = BTreeSet::new();
    let mut expanded = BTreeSet::new();
    let mut roots = vec![id.to_string()];

    // canonical names must be read before anything is evicted
    while let Some(root) = roots.pop() {
        if !expanded.insert(root.clone()) {
            continue;
        }

        let mut related: Vec<String> = known.iter().filter(|m| is_within(m, &root)).cloned().collect();
        related.push(root.clone());
        related.extend(ancestors(&root));

        for target in related {
            if let Some(canonical) = host.canonical_name(&target) {
                roots.push(canonical);
            }
            targets.insert(target);
        }
    }

    let mut evicted = Vec::new();
    for target in targets {
        if host.is_loaded(&target) {
            host.evict(&target);
            tracing::debug!(module = %target, requested = id, "evicted");
            evicted.push(target);
        }
    }
    evicted
}

fn ancestors(id: &str) -> impl Iterator<Item = String> + '_ {
    id.match_indices('.').map(move |(i, _)| id[..i].to_string())
}
