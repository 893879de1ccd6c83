use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::{Error, Result},
    host::HostRuntime,
    interface::{DeductionMode, InterfaceDeducer},
    probe::IsolatedProbe,
    registry::ModuleRegistry,
    version::HostVersion,
};

pub type PublicNamesTable = BTreeMap<String, BTreeSet<String>>;

/// Deduce every aggregatable module's public names with the strict checks
/// on. Modules the host cannot load are left out of the table.
pub fn generate_public_names(
    host: &dyn HostRuntime,
    registry: &ModuleRegistry,
    probe: Option<&IsolatedProbe>,
) -> Result<PublicNamesTable> {
    let deducer = InterfaceDeducer::new(host, registry).with_mode(DeductionMode::Strict);
    let mut table = PublicNamesTable::new();

    for module in registry.aggregatable() {
        if let Err(e) = host.load(module) {
            tracing::warn!(module = %module, reason = %e.reason, "not loadable here; left out");
            continue;
        }

        let names = match probe {
            Some(probe) => deducer.deduce_isolated(module, probe)?,
            None => deducer.deduce(module)?,
        };
        table.insert(module.clone(), names);
    }

    Ok(table)
}

/// Render `table` as a `["<version>"]` section of the public-names file.
pub fn render_table(version: HostVersion, table: &PublicNamesTable) -> Result<String> {
    let rendered = BTreeMap::from([(version.to_string(), table)]);
    toml::to_string(&rendered).map_err(|e| Error::MalformedData {
        what: "generated public names".to_string(),
        reason: e.to_string(),
    })
}
