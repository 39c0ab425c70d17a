//! Plugin registry integration tests.
//!
//! Tests for manifest discovery, failure isolation, collisions and
//! on-demand loading.

use crate::mocks::{og_title_manifest, write_manifest, MockPlugin};
use page_doc::plugin::PluginOrigin;
use page_doc::{Check, Document, Plugin, PluginLoadError, PluginRegistry, Status};
use pretty_assertions::assert_eq;

#[test]
fn test_registry_discovers_flat_and_directory_manifests() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "og_title.yaml", &og_title_manifest("og_title"));
    write_manifest(
        dir.path(),
        "lang/plugin.json",
        r#"{"plugin": {"name": "lang"}, "rule": {"kind": "pattern", "pattern": "<html[^>]*lang=\"([^\"]+)\""}}"#,
    );
    write_manifest(dir.path(), "README.txt", "not a manifest");

    let mut registry = PluginRegistry::new();
    let report = registry.discover(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(report.loaded, vec!["lang", "og_title"]);
    assert!(report.failures.is_empty());
    assert_eq!(registry.names(), vec!["lang", "og_title"]);
    assert_eq!(registry.get("og_title").unwrap().version(), "1.2.0");
    assert!(matches!(registry.origin("lang"), Some(PluginOrigin::Manifest(_))));

    let lang = registry.get("LANG").unwrap();
    let result = lang.evaluate(&Document::new(r#"<html lang="de"></html>"#));
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.notes, "de");
}

#[test]
fn test_registry_one_bad_candidate_of_n() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "a.yaml", &og_title_manifest("alpha"));
    write_manifest(dir.path(), "b.yaml", &og_title_manifest("beta"));
    write_manifest(dir.path(), "c.yaml", "plugin: [this is: not valid");
    write_manifest(dir.path(), "d.yaml", &og_title_manifest("delta"));

    let mut registry = PluginRegistry::new();
    let report = registry.discover(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(registry.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].candidate.ends_with("c.yaml"));
    assert_eq!(registry.failures().len(), 1);
}

#[test]
fn test_registry_contract_violation_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "good.yaml", &og_title_manifest("good"));
    write_manifest(dir.path(), "no_rule.yaml", "plugin: {name: no_rule}\n");
    write_manifest(dir.path(), "bad_regex.yaml", "plugin: {name: bad_regex}\nrule: {kind: pattern, pattern: '('}\n");

    let mut registry = PluginRegistry::new();
    let report = registry.discover(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(report.loaded, vec!["good"]);
    assert_eq!(report.failures.len(), 2);
}

#[test]
fn test_registry_collision_last_loaded_wins() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "a_first.yaml",
        "plugin: {name: dup, version: \"1.0.0\"}\nrule: {kind: pattern, pattern: 'x'}\n",
    );
    write_manifest(
        dir.path(),
        "b_second.yaml",
        "plugin: {name: dup, version: \"2.0.0\"}\nrule: {kind: pattern, pattern: 'x'}\n",
    );

    let mut registry = PluginRegistry::new();
    let report = registry.discover(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("dup").unwrap().version(), "2.0.0");
    assert_eq!(report.collisions.len(), 1);
    assert_eq!(report.collisions[0].identity, "dup");
    assert!(report.collisions[0].kept.ends_with("b_second.yaml"));
}

#[test]
fn test_registry_rediscovery_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "og.yaml", &og_title_manifest("og_title"));
    let locations = vec![dir.path().to_path_buf()];

    let mut registry = PluginRegistry::new();
    registry.discover(&locations).unwrap();
    let first = registry.get("og_title").unwrap();

    // Install a new plugin at runtime, then discover again
    write_manifest(dir.path(), "second.yaml", &og_title_manifest("og_second"));
    let report = registry.discover(&locations).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(report.collisions.is_empty());
    assert_eq!(registry.get("og_title").unwrap().name(), first.name());
}

#[test]
fn test_registry_rediscovery_drops_removed_and_broken_manifests() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "og.yaml", &og_title_manifest("og_title"));
    write_manifest(dir.path(), "gone.yaml", &og_title_manifest("gone"));
    write_manifest(dir.path(), "broken.yaml", &og_title_manifest("broken"));
    let locations = vec![dir.path().to_path_buf()];

    let mut registry = PluginRegistry::new();
    registry.register(MockPlugin::boxed("manual", Status::Ok, "registered")).unwrap();
    registry.discover(&locations).unwrap();
    assert_eq!(registry.names(), vec!["broken", "gone", "manual", "og_title"]);

    std::fs::remove_file(dir.path().join("gone.yaml")).unwrap();
    write_manifest(dir.path(), "broken.yaml", "plugin: {name: broken}\n");
    let report = registry.discover(&locations).unwrap();

    assert_eq!(registry.names(), vec!["manual", "og_title"]);
    assert!(registry.get("gone").is_none());
    assert!(registry.get("broken").is_none());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].candidate.ends_with("broken.yaml"));
}

#[test]
fn test_registry_rediscovery_replacing_registered_plugin_is_collision() {
    let dir = tempfile::tempdir().unwrap();
    let locations = vec![dir.path().to_path_buf()];

    let mut registry = PluginRegistry::new();
    registry.register(MockPlugin::boxed("og_title", Status::Ok, "registered")).unwrap();
    write_manifest(dir.path(), "og.yaml", &og_title_manifest("og_title"));
    let report = registry.discover(&locations).unwrap();

    assert_eq!(report.collisions.len(), 1);
    assert_eq!(report.collisions[0].replaced, "programmatic registration");
    assert!(report.collisions[0].kept.ends_with("og.yaml"));
    assert!(matches!(registry.origin("og_title"), Some(PluginOrigin::Manifest(_))));
}

#[test]
fn test_registry_partially_reachable_locations() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "og.yaml", &og_title_manifest("og_title"));

    let mut registry = PluginRegistry::new();
    let missing = dir.path().join("missing");
    let report = registry.discover(&[missing.clone(), dir.path().to_path_buf()]).unwrap();

    assert_eq!(report.unreachable, vec![missing]);
    assert_eq!(report.loaded, vec!["og_title"]);
}

#[test]
fn test_registry_no_reachable_locations() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = PluginRegistry::new();

    let result = registry.discover(&[dir.path().join("nope"), dir.path().join("nada")]);
    match result {
        Err(PluginLoadError::NoReachableLocations(paths)) => assert_eq!(paths.len(), 2),
        other => panic!("expected NoReachableLocations, got {:?}", other.map(|r| r.loaded)),
    }
}

#[test]
fn test_registry_load_one_by_identity() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "og_title.yml", &og_title_manifest("og_title"));
    write_manifest(dir.path(), "nested/plugin.yaml", &og_title_manifest("nested"));
    write_manifest(dir.path(), "liar.yaml", &og_title_manifest("someone_else"));

    let mut registry = PluginRegistry::with_search_paths(vec![dir.path().to_path_buf()]);

    assert_eq!(registry.load_one("OG_Title").unwrap().name(), "og_title");
    assert_eq!(registry.load_one("nested").unwrap().name(), "nested");
    assert!(matches!(registry.load_one("liar"), Err(PluginLoadError::Contract { .. })));
    assert!(matches!(registry.load_one("absent"), Err(PluginLoadError::NotFound(_))));
    assert_eq!(registry.names(), vec!["nested", "og_title"]);
}

#[test]
fn test_registry_factories_and_manifests_together() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "og.yaml", &og_title_manifest("og_title"));

    let mut registry = PluginRegistry::new();
    registry.register_factory("static_check", || MockPlugin::boxed("static_check", Status::Ok, "compiled in"));
    let report = registry.discover(&[dir.path().to_path_buf()]).unwrap();

    assert_eq!(report.loaded, vec!["static_check", "og_title"]);
    assert_eq!(registry.origin("static_check"), Some(&PluginOrigin::Factory));
    assert_eq!(registry.all().keys().cloned().collect::<Vec<_>>(), vec!["og_title", "static_check"]);
}
