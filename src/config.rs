use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{merge::MergeOptions, registry::RegistryRules, version::HostVersion};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub panoply: PanoplyMeta,

    #[serde(default)]
    pub merge: MergeOptions,

    #[serde(default)]
    pub registry: RegistryRules,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config: {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        if cfg.panoply.schema_version != SCHEMA_VERSION {
            bail!(
                "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                cfg.panoply.schema_version
            );
        }
        Ok(cfg)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanoplyMeta {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Overrides the version reported by the host for static-data lookups.
    #[serde(default)]
    pub host_version: Option<HostVersion>,

    /// A host manifest to aggregate from when `--host` is not given.
    #[serde(default)]
    pub host_manifest: Option<PathBuf>,

    /// A directory holding replacement static tables.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for PanoplyMeta {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            host_version: None,
            host_manifest: None,
            data_dir: None,
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{merge::InsertStrategy, priority::Priorities};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg = Config::from_toml_str("").unwrap();

        assert!(cfg.merge.lazy);
        assert!(cfg.merge.protect_reserved_names);
        assert!(!cfg.merge.include_deprecated);
        assert!(cfg.merge.priorities.is_empty());
        assert_eq!(cfg.merge.strategy, InsertStrategy::FillMissing);
        assert!(cfg.registry.meta.contains(&"__main__".to_string()));
    }

    #[test]
    fn parses_full_config() {
        let cfg = Config::from_toml_str(
            r#"
[panoply]
schema_version = 1
host_version = "3.9"

[merge]
lazy = false
include_deprecated = true
ignore = ["antigravity"]
priorities = { zlib = 2, lzma = -1 }

[registry]
toolkit = ["tkinter*"]
"#,
        )
        .unwrap();

        assert_eq!(cfg.panoply.host_version, Some(HostVersion::new(3, 9)));
        assert!(!cfg.merge.lazy);
        assert!(cfg.merge.ignore.contains("antigravity"));
        assert_eq!(cfg.merge.priorities, Priorities::scored([("zlib", 2), ("lzma", -1)]));
        assert_eq!(cfg.registry.toolkit, vec!["tkinter*".to_string()]);
        assert!(!cfg.registry.posix_only.is_empty());
    }

    #[test]
    fn rejects_unknown_schema() {
        let err = Config::from_toml_str("[panoply]\nschema_version = 7\n").unwrap_err();
        assert!(err.to_string().contains("schema_version"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[merge]\nlazy = false\n").unwrap();

        assert!(!Config::load_from_path(&path).unwrap().merge.lazy);
        assert!(Config::load_or_default(None).unwrap().merge.lazy);
        assert!(Config::load_from_path(&dir.path().join("missing.toml")).is_err());
    }
}
