mod common;

use pretty_assertions::assert_eq;
use std::rc::Rc;

use common::{aggregator, host, same_namespace, user_value};
use panoply::{
    reverse, reverse_by_origin, Error, HostRuntime, InsertStrategy, MergeOptions, ReverseOptions, Session,
    SymbolTable,
};

fn starting_namespace() -> SymbolTable {
    let mut ns = SymbolTable::new();
    ns.insert("compress".to_string(), user_value("<function my_compress>"));
    ns.insert("abs".to_string(), user_value("<built-in function abs>"));
    ns.insert("answer".to_string(), user_value("<function answer>"));
    ns
}

#[test]
fn reverse_restores_the_original_namespace() {
    let host = Rc::new(host());
    let agg = aggregator(&host);
    let original = starting_namespace();

    let mut ns = original.clone();
    let provenance = agg.import_into(&mut ns, &MergeOptions::default()).unwrap();
    assert!(ns.contains_key("crc32"));
    assert!(provenance.get("compress").is_none());

    agg.reverse(&mut ns, &provenance, ReverseOptions::default());
    assert!(same_namespace(&ns, &original));
}

#[test]
fn eager_round_trip_restores_too() {
    let host = Rc::new(host());
    let agg = aggregator(&host);
    let original = starting_namespace();

    let mut ns = original.clone();
    let provenance = agg.import_into(
        &mut ns,
        &MergeOptions {
            lazy: false,
            ..MergeOptions::default()
        },
    )
    .unwrap();
    let removed = reverse(&mut ns, &provenance);

    assert_eq!(removed.len(), provenance.len());
    assert!(same_namespace(&ns, &original));
}

#[test]
fn overridden_names_are_left_absent() {
    let host = Rc::new(host());
    let agg = aggregator(&host);

    let mut ns = starting_namespace();
    let provenance = agg.import_into(
        &mut ns,
        &MergeOptions {
            strategy: InsertStrategy::Override,
            ..MergeOptions::default()
        },
    )
    .unwrap();
    assert_eq!(provenance.origin("compress"), Some("zlib"));

    reverse(&mut ns, &provenance);
    assert!(!ns.contains_key("compress"));
    assert!(ns.contains_key("abs"));
    assert!(ns.contains_key("answer"));
}

#[test]
fn names_rebound_after_aggregation_survive() {
    let host = Rc::new(host());
    let agg = aggregator(&host);

    let mut ns = SymbolTable::new();
    let provenance = agg.import_into(&mut ns, &MergeOptions::default()).unwrap();
    let mine = user_value("<function my_crc32>");
    ns.insert("crc32".to_string(), mine.clone());

    let removed = reverse(&mut ns, &provenance);
    assert!(!removed.contains(&"crc32".to_string()));
    assert_eq!(ns.len(), 1);
    assert!(ns["crc32"].same(&mine));
}

#[test]
fn reversal_does_not_load_modules() {
    let host = Rc::new(host());
    let agg = aggregator(&host);

    let mut ns = SymbolTable::new();
    let provenance = agg.import_into(&mut ns, &MergeOptions::default()).unwrap();
    assert!(!provenance.is_empty());
    assert_eq!(host.load_count(), 0);

    reverse(&mut ns, &provenance);
    assert!(ns.is_empty());
    assert_eq!(host.load_count(), 0);
}

#[test]
fn purging_the_cache_reruns_module_initialization() {
    let host = Rc::new(host());
    let agg = aggregator(&host);
    let options = MergeOptions {
        lazy: false,
        include_deprecated: true,
        ..MergeOptions::default()
    };

    let mut ns = SymbolTable::new();
    let provenance = agg.import_into(&mut ns, &options).unwrap();
    assert!(ns.contains_key("loop"));
    assert_eq!(host.notices().len(), 1);

    agg.reverse(&mut ns, &provenance, ReverseOptions { purge_cache: true });
    assert!(!host.is_loaded("asyncore"));
    assert!(!host.is_loaded("posixpath"));
    assert!(!host.is_loaded("xml"));

    agg.import_into(&mut ns, &options).unwrap();
    assert_eq!(host.notices().len(), 2);
}

#[test]
fn origin_index_removes_every_stdlib_value() {
    let host = Rc::new(host());
    let agg = aggregator(&host);

    let original = starting_namespace();
    let mut ns = original.clone();
    agg.import_into(
        &mut ns,
        &MergeOptions {
            lazy: false,
            ..MergeOptions::default()
        },
    )
    .unwrap();

    let index = agg.origin_index();
    assert!(!index.is_empty());

    reverse_by_origin(&mut ns, &index);
    assert!(same_namespace(&ns, &original));
}

#[test]
fn session_guards_nested_scopes() {
    let host = Rc::new(host());
    let original = starting_namespace();
    let mut session = Session::new(aggregator(&host), original.clone(), MergeOptions::default());

    session.enter_scope();
    assert!(matches!(session.import_all(), Err(Error::Misuse(_))));
    session.exit_scope().unwrap();

    session.import_all().unwrap();
    assert!(session.namespace().contains_key("crc32"));

    session.deimport_all(ReverseOptions::default()).unwrap();
    assert!(same_namespace(session.namespace(), &original));
}
