use std::{collections::BTreeMap, fmt, ops::Deref, rc::Rc};

use crate::{error::Unavailable, version::HostVersion};

pub mod manifest;

pub use manifest::{AttrSpec, ManifestHost, ModuleSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// A module object; carries the module's canonical name.
    Module(String),
    Callable,
    Type,
    Constant(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub kind: ObjectKind,
    /// The module that defines this object, when the host records one.
    pub defined_in: Option<String>,
    pub repr: String,
}

/// A reference to a host object.
///
/// `same` is reference identity. `==` is identity or, failing that,
/// structural equality of the referenced objects.
#[derive(Clone)]
pub struct Value(Rc<Object>);

impl Value {
    pub fn new(object: Object) -> Self {
        Self(Rc::new(object))
    }

    pub fn module(name: &str) -> Self {
        Self::new(Object {
            kind: ObjectKind::Module(name.to_string()),
            defined_in: None,
            repr: format!("<module '{name}'>"),
        })
    }

    pub fn same(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the referenced object, stable for as long as any clone lives.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn as_module(&self) -> Option<&str> {
        match &self.0.kind {
            ObjectKind::Module(name) => Some(name),
            _ => None,
        }
    }

    pub fn defined_in(&self) -> Option<&str> {
        self.0.defined_in.as_deref()
    }
}

impl Deref for Value {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || *self.0 == *other.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.repr)
    }
}

/// A loaded module as seen by the aggregator.
#[derive(Debug)]
pub struct Module {
    name: String,
    object: Value,
    exports: Option<Vec<String>>,
    attrs: BTreeMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let object = Value::module(&name);
        Self {
            name,
            object,
            exports: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_exports<I, S>(mut self, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = Some(exports.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Canonical name. May differ from the id it was loaded under (aliases).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module itself as a host value.
    pub fn object(&self) -> &Value {
        &self.object
    }

    /// The explicit export list, if the module declares one.
    pub fn exports(&self) -> Option<&[String]> {
        self.exports.as_deref()
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The host runtime's module-loading cache.
///
/// Methods take `&self`: hosts keep their cache behind interior mutability,
/// the way a runtime's module table is shared by everything in the process.
pub trait HostRuntime {
    /// The running host version, used as the default for version-indexed data.
    fn version(&self) -> HostVersion;

    fn is_loaded(&self, id: &str) -> bool;

    /// Load (or fetch from cache) the module registered under `id`.
    fn load(&self, id: &str) -> Result<Rc<Module>, Unavailable>;

    /// Drop the cache entry for exactly `id`. Related entries are the caller's job.
    fn evict(&self, id: &str);

    /// The canonical name of the module cached under `id`, when it differs.
    fn canonical_name(&self, id: &str) -> Option<String> {
        let _ = id;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callable(repr: &str, defined_in: &str) -> Value {
        Value::new(Object {
            kind: ObjectKind::Callable,
            defined_in: Some(defined_in.to_string()),
            repr: repr.to_string(),
        })
    }

    #[test]
    fn identity_and_equality_differ() {
        let a = callable("<function compress>", "zlib");
        let b = callable("<function compress>", "zlib");

        assert!(!a.same(&b));
        assert_eq!(a, b);
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn module_values_expose_their_name() {
        let m = Module::new("os.path");
        assert_eq!(m.object().as_module(), Some("os.path"));
        assert_eq!(m.object().defined_in(), None);
    }
}
