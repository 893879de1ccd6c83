use serde::Deserialize;
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    path::Path,
    rc::Rc,
};

use super::{HostRuntime, Module, Object, ObjectKind, Value};
use crate::{
    error::{Error, Result, Unavailable},
    registry::ModuleEnumerator,
    version::HostVersion,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleSpec {
    pub exports: Option<Vec<String>>,
    pub attrs: BTreeMap<String, AttrSpec>,
    /// Loading fails with this reason.
    pub unavailable: Option<String>,
    /// Loading this id yields the module with this canonical name.
    pub alias_of: Option<String>,
    /// Emitted each time the module is initialized (e.g. a deprecation notice).
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttrSpec {
    Callable {
        #[serde(default)]
        defined_in: Option<String>,
    },
    Type {
        #[serde(default)]
        defined_in: Option<String>,
    },
    Constant {
        value: serde_json::Value,
        #[serde(default)]
        defined_in: Option<String>,
    },
    Module {
        target: String,
    },
}

impl ModuleSpec {
    pub fn exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn callable(self, name: &str) -> Self {
        self.attr(name, AttrSpec::Callable { defined_in: None })
    }

    /// A callable re-imported from `origin`.
    pub fn callable_from(self, name: &str, origin: &str) -> Self {
        self.attr(
            name,
            AttrSpec::Callable {
                defined_in: Some(origin.to_string()),
            },
        )
    }

    pub fn class(self, name: &str) -> Self {
        self.attr(name, AttrSpec::Type { defined_in: None })
    }

    pub fn constant(self, name: &str, value: serde_json::Value) -> Self {
        self.attr(
            name,
            AttrSpec::Constant {
                value,
                defined_in: None,
            },
        )
    }

    /// A reference to another module object bound under `name`.
    pub fn module_ref(self, name: &str, target: &str) -> Self {
        self.attr(
            name,
            AttrSpec::Module {
                target: target.to_string(),
            },
        )
    }

    pub fn attr(mut self, name: &str, spec: AttrSpec) -> Self {
        self.attrs.insert(name.to_string(), spec);
        self
    }

    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    pub fn alias_of(mut self, canonical: &str) -> Self {
        self.alias_of = Some(canonical.to_string());
        self
    }

    pub fn notice(mut self, text: &str) -> Self {
        self.notice = Some(text.to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: HostVersion,
    #[serde(default)]
    modules: BTreeMap<String, ModuleSpec>,
}

/// A host whose modules are described up front.
///
/// Loading a dotted module loads its ancestor packages first. Every load
/// instantiates fresh objects, so a module evicted and loaded again hands
/// out values with new identities.
///
/// ```toml
/// version = "3.11"
///
/// [modules.zlib]
/// exports = ["compress", "MAX_WBITS"]
/// attrs.compress = { kind = "callable" }
/// attrs.MAX_WBITS = { kind = "constant", value = 15 }
///
/// [modules."os.path"]
/// alias_of = "posixpath"
/// ```
#[derive(Debug)]
pub struct ManifestHost {
    version: HostVersion,
    specs: BTreeMap<String, ModuleSpec>,
    cache: RefCell<BTreeMap<String, Rc<Module>>>,
    loads: RefCell<Vec<String>>,
    notices: RefCell<Vec<String>>,
}

impl ManifestHost {
    pub fn new(version: HostVersion) -> Self {
        Self {
            version,
            specs: BTreeMap::new(),
            cache: RefCell::new(BTreeMap::new()),
            loads: RefCell::new(Vec::new()),
            notices: RefCell::new(Vec::new()),
        }
    }

    pub fn with_module(mut self, id: &str, spec: ModuleSpec) -> Self {
        self.specs.insert(id.to_string(), spec);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).map_err(|e| Error::MalformedData {
            what: "host manifest".to_string(),
            reason: e.to_string(),
        })?;

        let mut host = Self::new(manifest.version);
        host.specs = manifest.modules;
        Ok(host)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| Error::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&text)
    }

    /// Number of real (uncached) module initializations so far.
    pub fn load_count(&self) -> usize {
        self.loads.borrow().len()
    }

    /// Ids of real module initializations, in order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.borrow().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }

    fn instantiate(&self, id: &str, spec: &ModuleSpec) -> Module {
        let canonical = spec.alias_of.as_deref().unwrap_or(id);
        let mut module = Module::new(canonical);

        if let Some(exports) = &spec.exports {
            module = module.with_exports(exports.iter().cloned());
        }

        for (name, attr) in spec.attrs.iter() {
            let value = match attr {
                AttrSpec::Callable { defined_in } => Value::new(Object {
                    kind: ObjectKind::Callable,
                    defined_in: Some(defined_in.as_deref().unwrap_or(canonical).to_string()),
                    repr: format!("<function {name}>"),
                }),
                AttrSpec::Type { defined_in } => {
                    let origin = defined_in.as_deref().unwrap_or(canonical);
                    Value::new(Object {
                        kind: ObjectKind::Type,
                        defined_in: Some(origin.to_string()),
                        repr: format!("<class '{origin}.{name}'>"),
                    })
                }
                AttrSpec::Constant { value, defined_in } => Value::new(Object {
                    kind: ObjectKind::Constant(value.clone()),
                    defined_in: defined_in.clone(),
                    repr: value.to_string(),
                }),
                AttrSpec::Module { target } => Value::module(target),
            };
            module = module.with_attr(name.clone(), value);
        }

        module
    }
}

impl ModuleEnumerator for ManifestHost {
    fn list(&self) -> BTreeSet<String> {
        self.specs.keys().cloned().collect()
    }
}

impl HostRuntime for ManifestHost {
    fn version(&self) -> HostVersion {
        self.version
    }

    fn is_loaded(&self, id: &str) -> bool {
        self.cache.borrow().contains_key(id)
    }

    fn load(&self, id: &str) -> std::result::Result<Rc<Module>, Unavailable> {
        if let Some(module) = self.cache.borrow().get(id).cloned() {
            return Ok(module);
        }

        let spec = self
            .specs
            .get(id)
            .ok_or_else(|| Unavailable::new(id, format!("no module named '{id}'")))?;

        if let Some(reason) = &spec.unavailable {
            return Err(Unavailable::new(id, reason.clone()));
        }

        if let Some((parent, _)) = id.rsplit_once('.') {
            if self.specs.contains_key(parent) {
                self.load(parent).map_err(|e| {
                    Unavailable::new(id, format!("parent package failed to load: {}", e.reason))
                })?;
            }
        }

        let module = Rc::new(self.instantiate(id, spec));
        self.loads.borrow_mut().push(id.to_string());

        if let Some(notice) = &spec.notice {
            tracing::warn!(module = id, "{notice}");
            self.notices.borrow_mut().push(notice.clone());
        }

        let mut cache = self.cache.borrow_mut();
        cache.insert(id.to_string(), module.clone());
        if module.name() != id {
            cache
                .entry(module.name().to_string())
                .or_insert_with(|| module.clone());
        }

        Ok(module)
    }

    fn evict(&self, id: &str) {
        self.cache.borrow_mut().remove(id);
    }

    fn canonical_name(&self, id: &str) -> Option<String> {
        self.cache
            .borrow()
            .get(id)
            .map(|m| m.name().to_string())
            .filter(|name| name != id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host() -> ManifestHost {
        ManifestHost::new(HostVersion::new(3, 11))
            .with_module("xml", ModuleSpec::default())
            .with_module("xml.dom", ModuleSpec::default().class("Node"))
            .with_module("zlib", ModuleSpec::default().callable("compress").constant("MAX_WBITS", json!(15)))
            .with_module("tkinter", ModuleSpec::default().unavailable("no display"))
    }

    #[test]
    fn loads_are_cached() {
        let h = host();
        let a = h.load("zlib").unwrap();
        let b = h.load("zlib").unwrap();

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(h.load_count(), 1);
    }

    #[test]
    fn submodule_load_initializes_parent_first() {
        let h = host();
        h.load("xml.dom").unwrap();

        assert_eq!(h.loads(), vec!["xml".to_string(), "xml.dom".to_string()]);
        assert!(h.is_loaded("xml"));
    }

    #[test]
    fn reload_after_evict_yields_new_identities() {
        let h = host();
        let first = h.load("zlib").unwrap().attr("compress").cloned().unwrap();
        h.evict("zlib");
        let second = h.load("zlib").unwrap().attr("compress").cloned().unwrap();

        assert!(!first.same(&second));
        assert_eq!(first, second);
        assert_eq!(h.load_count(), 2);
    }

    #[test]
    fn unavailable_and_missing_modules_fail() {
        let h = host();
        assert_eq!(h.load("tkinter").unwrap_err().reason, "no display");
        assert!(h.load("nonexistent").is_err());
        assert_eq!(h.load_count(), 0);
    }

    #[test]
    fn parses_manifest_text() {
        let text = r#"
version = "3.9"

# zlib is plain
[modules.zlib]
exports = ["compress"]
attrs.compress = { kind = "callable" }
attrs.MAX_WBITS = { kind = "constant", value = 15 }

[modules."os.path"]
alias_of = "posixpath"
attrs.sep = { kind = "constant", value = "/" }
"#;
        let h = ManifestHost::from_toml_str(text).unwrap();
        assert_eq!(h.version(), HostVersion::new(3, 9));

        let zlib = h.load("zlib").unwrap();
        assert_eq!(zlib.exports(), Some(&["compress".to_string()][..]));
        assert_eq!(zlib.attr("compress").unwrap().defined_in(), Some("zlib"));

        h.load("os.path").unwrap();
        assert_eq!(h.canonical_name("os.path").as_deref(), Some("posixpath"));
        assert!(h.is_loaded("posixpath"));
    }

    #[test]
    fn rejects_bad_manifest_version() {
        let err = ManifestHost::from_toml_str("version = \"three\"").unwrap_err();
        assert!(matches!(err, Error::MalformedData { .. }));
    }
}
