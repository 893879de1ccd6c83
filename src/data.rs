use serde::{de::DeserializeOwned, Deserialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::{Arc, OnceLock},
};

use crate::{
    deprecation::DeprecationTable,
    error::{Error, Result},
    version::HostVersion,
};

const DEPRECATED_MODULES: &str = include_str!("../data/deprecated_modules.toml");
const DEPRECATED_NAMES: &str = include_str!("../data/deprecated_names.toml");
const PUBLIC_NAMES: &str = include_str!("../data/public_names.toml");
const RESERVED_NAMES: &str = include_str!("../data/reserved_names.toml");

pub const DEPRECATED_MODULES_FILE: &str = "deprecated_modules.toml";
pub const DEPRECATED_NAMES_FILE: &str = "deprecated_names.toml";
pub const PUBLIC_NAMES_FILE: &str = "public_names.toml";
pub const RESERVED_NAMES_FILE: &str = "reserved_names.toml";

pub type ModuleTable = BTreeMap<HostVersion, BTreeSet<String>>;
pub type NameTable = BTreeMap<HostVersion, BTreeMap<String, BTreeSet<String>>>;

fn parse_toml<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    toml::from_str(text).map_err(|e| Error::MalformedData {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

fn key_versions<T>(raw: BTreeMap<String, T>) -> Result<BTreeMap<HostVersion, T>> {
    raw.into_iter()
        .map(|(k, v)| Ok((HostVersion::parse(&k)?, v)))
        .collect()
}

/// `"<ver>" = [module, ...]`
pub fn parse_module_table(text: &str, what: &str) -> Result<ModuleTable> {
    let raw: BTreeMap<String, BTreeSet<String>> = parse_toml(text, what)?;
    key_versions(raw)
}

/// `["<ver>"] module = [name, ...]`
pub fn parse_name_table(text: &str, what: &str) -> Result<NameTable> {
    let raw: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = parse_toml(text, what)?;
    key_versions(raw)
}

/// Public names per module, recorded for specific versions only.
#[derive(Debug, Clone, Default)]
pub struct PublicNames {
    table: NameTable,
}

impl PublicNames {
    pub fn new(table: NameTable) -> Self {
        Self { table }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(Self::new(parse_name_table(text, "public names table")?))
    }

    pub fn versions(&self) -> impl Iterator<Item = HostVersion> + '_ {
        self.table.keys().copied()
    }

    pub fn has_version(&self, version: HostVersion) -> bool {
        self.table.contains_key(&version)
    }

    fn for_version(&self, version: HostVersion) -> Result<&BTreeMap<String, BTreeSet<String>>> {
        self.table.get(&version).ok_or(Error::UnknownVersion {
            table: "public names",
            version,
        })
    }

    /// Every module recorded for `version`.
    pub fn modules(&self, version: HostVersion) -> Result<BTreeSet<String>> {
        Ok(self.for_version(version)?.keys().cloned().collect())
    }

    /// Public names of `module`; empty when the version has no entry for it.
    pub fn names(&self, module: &str, version: HostVersion) -> Result<BTreeSet<String>> {
        Ok(self
            .for_version(version)?
            .get(module)
            .cloned()
            .unwrap_or_default())
    }

    /// Like [`names`](Self::names) but `None` when nothing is recorded.
    pub fn lookup(&self, module: &str, version: HostVersion) -> Option<&BTreeSet<String>> {
        self.table.get(&version)?.get(module)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservedNames {
    /// Always-available names protected from being shadowed.
    #[serde(default)]
    pub builtins: BTreeSet<String>,
    /// Names that can never be bound.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

impl ReservedNames {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        parse_toml(text, "reserved names table")
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn is_keyword(&self, name: &str) -> bool {
        self.keywords.contains(name)
    }
}

/// Every static table the aggregator consults.
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    pub deprecations: DeprecationTable,
    pub public_names: PublicNames,
    pub reserved: ReservedNames,
}

impl StaticData {
    /// The bundled tables, parsed once per process.
    pub fn builtin() -> Result<Arc<StaticData>> {
        static BUILTIN: OnceLock<Arc<StaticData>> = OnceLock::new();

        if let Some(data) = BUILTIN.get() {
            return Ok(data.clone());
        }

        let parsed = Arc::new(Self::from_toml_strs(
            DEPRECATED_MODULES,
            DEPRECATED_NAMES,
            PUBLIC_NAMES,
            RESERVED_NAMES,
        )?);
        Ok(BUILTIN.get_or_init(|| parsed).clone())
    }

    pub fn from_toml_strs(
        deprecated_modules: &str,
        deprecated_names: &str,
        public_names: &str,
        reserved_names: &str,
    ) -> Result<Self> {
        Ok(Self {
            deprecations: DeprecationTable::new(
                parse_module_table(deprecated_modules, "deprecated modules table")?,
                parse_name_table(deprecated_names, "deprecated names table")?,
            ),
            public_names: PublicNames::from_toml_str(public_names)?,
            reserved: ReservedNames::from_toml_str(reserved_names)?,
        })
    }

    /// Load the four tables from `dir`. Missing files are I/O errors.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let read = |file: &str| {
            let path = dir.join(file);
            fs::read_to_string(&path).map_err(|error| Error::Io { path, error })
        };

        Self::from_toml_strs(
            &read(DEPRECATED_MODULES_FILE)?,
            &read(DEPRECATED_NAMES_FILE)?,
            &read(PUBLIC_NAMES_FILE)?,
            &read(RESERVED_NAMES_FILE)?,
        )
    }
}
