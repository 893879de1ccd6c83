use regex::Regex;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::OnceLock,
};

use crate::{data::ReservedNames, error::Unavailable, host::Value, lazy::Deferred};

pub type Realization = Result<Value, Unavailable>;

/// A value bound to a name, either fetched already or fetched on first use.
#[derive(Clone)]
pub enum Binding {
    Eager(Value),
    Lazy(Deferred<Realization>),
}

impl Binding {
    pub fn lazy(thunk: impl FnOnce() -> Realization + 'static) -> Self {
        Binding::Lazy(Deferred::new(thunk))
    }

    /// The bound value, realizing a lazy binding on first call.
    pub fn value(&self) -> Realization {
        match self {
            Binding::Eager(value) => Ok(value.clone()),
            Binding::Lazy(deferred) => deferred.force().clone(),
        }
    }

    /// The value if it is available without running anything.
    pub fn peek(&self) -> Option<&Value> {
        match self {
            Binding::Eager(value) => Some(value),
            Binding::Lazy(deferred) => deferred.get().and_then(|r| r.as_ref().ok()),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Binding::Lazy(_))
    }

    pub fn is_realized(&self) -> bool {
        match self {
            Binding::Eager(_) => true,
            Binding::Lazy(deferred) => deferred.is_realized(),
        }
    }

    /// Realize and drop the wrapper.
    pub fn into_eager(self) -> Result<Binding, Unavailable> {
        self.value().map(Binding::Eager)
    }

    /// Identity without forcing anything.
    ///
    /// Two handles of one deferred binding are the same binding. An eager
    /// and a lazy binding are the same only once the lazy side has been
    /// realized to that very value.
    pub fn same(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Lazy(a), Binding::Lazy(b)) if a.ptr_eq(b) => true,
            _ => match (self.peek(), other.peek()) {
                (Some(a), Some(b)) => a.same(b),
                _ => false,
            },
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Eager(value)
    }
}

/// Compares realized values; forces lazy sides.
impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.same(other) || self.value() == other.value()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Eager(value) => value.fmt(f),
            Binding::Lazy(deferred) => match deferred.get() {
                Some(Ok(value)) => value.fmt(f),
                Some(Err(e)) => write!(f, "<unavailable: {}>", e.module),
                None => f.write_str("<deferred>"),
            },
        }
    }
}

/// Name to binding, produced fresh by each merge.
pub type SymbolTable = BTreeMap<String, Binding>;

/// A mutable string-keyed destination for aggregated symbols.
pub trait Namespace {
    fn get(&self, name: &str) -> Option<&Binding>;

    fn insert(&mut self, name: String, binding: Binding) -> Option<Binding>;

    fn remove(&mut self, name: &str) -> Option<Binding>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn names(&self) -> Vec<String>;
}

impl Namespace for BTreeMap<String, Binding> {
    fn get(&self, name: &str) -> Option<&Binding> {
        BTreeMap::get(self, name)
    }

    fn insert(&mut self, name: String, binding: Binding) -> Option<Binding> {
        BTreeMap::insert(self, name, binding)
    }

    fn remove(&mut self, name: &str) -> Option<Binding> {
        BTreeMap::remove(self, name)
    }

    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl Namespace for HashMap<String, Binding> {
    fn get(&self, name: &str) -> Option<&Binding> {
        HashMap::get(self, name)
    }

    fn insert(&mut self, name: String, binding: Binding) -> Option<Binding> {
        HashMap::insert(self, name, binding)
    }

    fn remove(&mut self, name: &str) -> Option<Binding> {
        HashMap::remove(self, name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Whether `name` can be bound: identifier-shaped and not a keyword.
pub fn is_identifier(name: &str, reserved: &ReservedNames) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[\p{XID_Start}_]\p{XID_Continue}*$").unwrap());

    re.is_match(name) && !reserved.is_keyword(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Object, ObjectKind};
    use std::{cell::Cell, collections::BTreeSet, rc::Rc};

    fn callable(repr: &str) -> Value {
        Value::new(Object {
            kind: ObjectKind::Callable,
            defined_in: Some("zlib".to_string()),
            repr: repr.to_string(),
        })
    }

    #[test]
    fn lazy_binding_realizes_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let value = callable("<function compress>");
        let expected = value.clone();

        let b = Binding::lazy(move || {
            counter.set(counter.get() + 1);
            Ok(value.clone())
        });

        assert!(b.peek().is_none());
        assert!(b.value().unwrap().same(&expected));
        assert!(b.value().unwrap().same(&expected));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failed_realization_is_memoized() {
        let b = Binding::lazy(|| Err(Unavailable::new("tkinter", "no display")));

        assert_eq!(b.value().unwrap_err().module, "tkinter");
        assert!(b.is_realized());
        assert!(b.peek().is_none());
        assert_eq!(format!("{b:?}"), "<unavailable: tkinter>");
    }

    #[test]
    fn identity_does_not_force() {
        let value = callable("<function compress>");
        let v = value.clone();
        let lazy = Binding::lazy(move || Ok(v));
        let eager = Binding::from(value);

        assert!(!lazy.same(&eager));
        assert!(!lazy.is_realized());
        assert!(lazy.same(&lazy.clone()));

        assert_eq!(lazy, eager);
        assert!(lazy.same(&eager));
    }

    #[test]
    fn into_eager_unwraps() {
        let b = Binding::lazy(|| Ok(callable("<function crc32>")));
        let eager = b.into_eager().unwrap();
        assert!(!eager.is_deferred());
    }

    #[test]
    fn identifiers() {
        let reserved = ReservedNames {
            builtins: BTreeSet::new(),
            keywords: BTreeSet::from(["None".to_string(), "lambda".to_string()]),
        };

        for ok in ["compress", "_private", "MAX_WBITS", "x1", "café", "π", "_ñ2"] {
            assert!(is_identifier(ok, &reserved), "{ok}");
        }
        for bad in ["1x", "a-b", "", "None", "lambda", "a.b", "x€", "²x", "a b"] {
            assert!(!is_identifier(bad, &reserved), "{bad}");
        }
    }

    #[test]
    fn hash_namespace_lists_sorted_names() {
        let mut ns: HashMap<String, Binding> = HashMap::new();
        Namespace::insert(&mut ns, "b".to_string(), callable("b").into());
        Namespace::insert(&mut ns, "a".to_string(), callable("a").into());

        assert_eq!(Namespace::names(&ns), vec!["a".to_string(), "b".to_string()]);
        assert!(Namespace::contains(&ns, "a"));
    }
}
