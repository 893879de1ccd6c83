#![allow(dead_code)]

use std::rc::Rc;

use panoply::{
    Aggregator, Binding, HostVersion, ManifestHost, ModuleEnumerator, ModuleRegistry, ModuleSpec, Platform,
    RegistryRules, StaticData, SymbolTable, Value,
};
use serde_json::json;

pub const VERSION: HostVersion = HostVersion::new(3, 11);

/// A small 3.11 host. zlib, lzma, operator and typing are recorded in the
/// bundled public-names table; xml and os.path are deduced live.
pub fn host() -> ManifestHost {
    ManifestHost::new(VERSION)
        .with_module(
            "zlib",
            ModuleSpec::default()
                .callable("compress")
                .callable("crc32")
                .constant("MAX_WBITS", json!(15)),
        )
        .with_module(
            "lzma",
            ModuleSpec::default()
                .callable("compress")
                .class("LZMAFile")
                .constant("CHECK_CRC32", json!(1)),
        )
        .with_module("operator", ModuleSpec::default().callable("abs").callable("add"))
        .with_module(
            "typing",
            ModuleSpec::default().class("Any").class("List").class("Dict"),
        )
        .with_module(
            "asyncore",
            ModuleSpec::default()
                .callable("loop")
                .notice("asyncore is deprecated and slated for removal in Python 3.12"),
        )
        .with_module("xml", ModuleSpec::default().exports(Vec::<String>::new()))
        .with_module("xml.dom", ModuleSpec::default().class("Node").callable("_private"))
        .with_module(
            "os.path",
            ModuleSpec::default()
                .alias_of("posixpath")
                .constant("sep", json!("/")),
        )
        .with_module("tkinter", ModuleSpec::default().unavailable("no display"))
}

pub fn aggregator(host: &Rc<ManifestHost>) -> Aggregator {
    let registry = ModuleRegistry::new(&host.list(), Platform::Linux, true, &RegistryRules::default()).unwrap();
    Aggregator::with_parts(host.clone(), registry, StaticData::builtin().unwrap())
}

pub fn attr(host: &ManifestHost, module: &str, name: &str) -> Value {
    use panoply::HostRuntime;
    host.load(module).unwrap().attr(name).cloned().unwrap()
}

pub fn user_value(repr: &str) -> Binding {
    Binding::from(Value::new(panoply::host::Object {
        kind: panoply::host::ObjectKind::Callable,
        defined_in: Some("__main__".to_string()),
        repr: repr.to_string(),
    }))
}

/// Same keys, each bound to the very same binding.
pub fn same_namespace(a: &SymbolTable, b: &SymbolTable) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.same(w)))
}
