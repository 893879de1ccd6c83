use glob::Pattern;
use serde::Deserialize;
use std::{cell::OnceCell, collections::BTreeSet};

use crate::{
    context::Platform,
    data::PublicNames,
    error::{Error, Result},
    version::HostVersion,
};

/// Supplies the identifiers of every module in the standard distribution.
pub trait ModuleEnumerator {
    fn list(&self) -> BTreeSet<String>;
}

impl ModuleEnumerator for BTreeSet<String> {
    fn list(&self) -> BTreeSet<String> {
        self.clone()
    }
}

impl ModuleEnumerator for [&str] {
    fn list(&self) -> BTreeSet<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Enumerates the modules recorded in the static public-names table for one version.
pub struct StaticEnumerator<'a> {
    names: &'a PublicNames,
    version: HostVersion,
}

impl<'a> StaticEnumerator<'a> {
    pub fn new(names: &'a PublicNames, version: HostVersion) -> Self {
        Self { names, version }
    }
}

impl ModuleEnumerator for StaticEnumerator<'_> {
    fn list(&self) -> BTreeSet<String> {
        self.names.modules(self.version).unwrap_or_default()
    }
}

/// Exclusion rules, as glob patterns over module identifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryRules {
    /// Meta and self-referential modules.
    pub meta: Vec<String>,
    /// Modules whose import prints or opens things.
    pub side_effects: Vec<String>,
    pub internal: Vec<String>,
    /// Listed in the docs but not importable.
    pub unrunnable: Vec<String>,
    /// Dropped on non-posix platforms.
    pub posix_only: Vec<String>,
    /// Dropped when no UI toolkit can start.
    pub toolkit: Vec<String>,
}

fn owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|s| s.to_string()).collect()
}

impl Default for RegistryRules {
    fn default() -> Self {
        Self {
            meta: owned(&["__main__", "builtins"]),
            side_effects: owned(&["__phello__", "__phello__.*", "antigravity", "this"]),
            internal: owned(&["test", "test.*"]),
            unrunnable: owned(&["lib2to3", "lib2to3.*", "distutils.command.bdist_packager"]),
            posix_only: owned(&[
                "crypt",
                "curses",
                "curses.*",
                "dbm.gnu",
                "dbm.ndbm",
                "fcntl",
                "grp",
                "multiprocessing.popen_fork",
                "multiprocessing.popen_forkserver",
                "multiprocessing.popen_spawn_posix",
                "nis",
                "ossaudiodev",
                "posix",
                "pty",
                "pwd",
                "readline",
                "resource",
                "spwd",
                "syslog",
                "termios",
                "tty",
            ]),
            toolkit: owned(&["tkinter", "tkinter.*", "turtle", "turtledemo", "turtledemo.*"]),
        }
    }
}

fn compile(group: &str, patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::MalformedData {
                what: format!("registry.{group} pattern `{p}`"),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn matches_any(patterns: &[Pattern], id: &str) -> bool {
    patterns.iter().any(|p| p.matches(id))
}

/// The authoritative set of modules eligible for aggregation.
#[derive(Debug)]
pub struct ModuleRegistry {
    known: BTreeSet<String>,
    always_excluded: Vec<Pattern>,
    platform_excluded: Vec<Pattern>,
    aggregatable: OnceCell<BTreeSet<String>>,
}

impl ModuleRegistry {
    pub fn new(
        enumerator: &dyn ModuleEnumerator,
        platform: Platform,
        toolkit_available: bool,
        rules: &RegistryRules,
    ) -> Result<Self> {
        let mut always_excluded = compile("meta", &rules.meta)?;
        always_excluded.extend(compile("side_effects", &rules.side_effects)?);
        always_excluded.extend(compile("internal", &rules.internal)?);

        let mut platform_excluded = compile("unrunnable", &rules.unrunnable)?;
        if !platform.is_posix() {
            platform_excluded.extend(compile("posix_only", &rules.posix_only)?);
        }
        if !toolkit_available {
            platform_excluded.extend(compile("toolkit", &rules.toolkit)?);
        }

        Ok(Self {
            known: enumerator.list(),
            always_excluded,
            platform_excluded,
            aggregatable: OnceCell::new(),
        })
    }

    /// Every standard module except meta, side-effecting and internal ones.
    ///
    /// Platform gating does not apply here: a re-export from a module that
    /// merely cannot load on this machine is still a re-export.
    pub fn known(&self) -> BTreeSet<String> {
        self.known
            .iter()
            .filter(|id| !matches_any(&self.always_excluded, id))
            .cloned()
            .collect()
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.known.contains(id) && !matches_any(&self.always_excluded, id)
    }

    /// Whether the enumerator lists `id` at all, exclusion rules aside.
    pub fn is_stdlib(&self, id: &str) -> bool {
        self.known.contains(id)
    }

    /// The filtered set, computed on first use.
    pub fn aggregatable(&self) -> &BTreeSet<String> {
        self.aggregatable.get_or_init(|| {
            let set: BTreeSet<String> = self
                .known
                .iter()
                .filter(|id| !matches_any(&self.always_excluded, id))
                .filter(|id| !matches_any(&self.platform_excluded, id))
                .cloned()
                .collect();
            tracing::debug!(
                known = self.known.len(),
                aggregatable = set.len(),
                "module registry filtered"
            );
            set
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.aggregatable().contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> BTreeSet<String> {
        [
            "__main__",
            "antigravity",
            "curses",
            "curses.ascii",
            "json",
            "lib2to3.pgen2",
            "math",
            "test.support",
            "tkinter",
            "tkinter.ttk",
            "turtle",
        ]
        .as_slice()
        .list()
    }

    fn names(ids: &[&str]) -> BTreeSet<String> {
        ids.list()
    }

    #[test]
    fn posix_with_toolkit_keeps_platform_modules() {
        let reg = ModuleRegistry::new(&base(), Platform::Linux, true, &RegistryRules::default()).unwrap();
        assert_eq!(
            reg.aggregatable(),
            &names(&["curses", "curses.ascii", "json", "math", "tkinter", "tkinter.ttk", "turtle"])
        );
    }

    #[test]
    fn windows_without_toolkit_shrinks_silently() {
        let reg = ModuleRegistry::new(&base(), Platform::Windows, false, &RegistryRules::default()).unwrap();
        assert_eq!(reg.aggregatable(), &names(&["json", "math"]));
        assert!(!reg.contains("curses"));
    }

    #[test]
    fn known_ignores_platform_gates() {
        let reg = ModuleRegistry::new(&base(), Platform::Windows, false, &RegistryRules::default()).unwrap();
        assert!(reg.is_known("curses"));
        assert!(reg.is_known("lib2to3.pgen2"));
        assert!(!reg.is_known("test.support"));
        assert!(!reg.known().contains("__main__"));
        assert!(reg.is_stdlib("__main__"));
        assert!(!reg.is_stdlib("numpy"));
    }

    #[test]
    fn aggregatable_set_is_cached() {
        let reg = ModuleRegistry::new(&base(), Platform::Mac, true, &RegistryRules::default()).unwrap();
        assert!(std::ptr::eq(reg.aggregatable(), reg.aggregatable()));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let rules = RegistryRules {
            meta: vec!["[".to_string()],
            ..RegistryRules::default()
        };
        let err = ModuleRegistry::new(&base(), Platform::Linux, true, &rules).unwrap_err();
        assert!(matches!(err, Error::MalformedData { .. }));
    }

    #[test]
    fn static_enumerator_lists_recorded_modules() {
        let data = crate::data::StaticData::builtin().unwrap();
        let modules = StaticEnumerator::new(&data.public_names, HostVersion::new(3, 12)).list();
        assert!(modules.contains("zlib"));
        assert!(!modules.contains("imp"));

        assert!(StaticEnumerator::new(&data.public_names, HostVersion::new(2, 7)).list().is_empty());
    }
}
