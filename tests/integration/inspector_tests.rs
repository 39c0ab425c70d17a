//! Inspector integration tests.
//!
//! Tests for full runs, name resolution, plugin precedence, caching,
//! acquisition and batch URL processing.

use crate::mocks::{write_manifest, MockFetcher, MockPlugin, PanickingPlugin, EXAMPLE_PAGE};
use page_doc::checks::BUILTIN_ORDER;
use page_doc::{CheckResult, Document, Inspector, InspectorConfig, InspectorState, PageDocError, Status};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn test_config() -> InspectorConfig {
    InspectorConfig {
        use_default_plugin_paths: false,
        ..InspectorConfig::default()
    }
}

fn find<'a>(results: &'a [CheckResult], name: &str) -> &'a CheckResult {
    results
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no result for {}", name))
}

#[test]
fn test_inspector_example_page() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));
    let results = inspector.run_all(None).unwrap();

    assert_eq!(results.len(), BUILTIN_ORDER.len());

    let title = find(&results, "title");
    assert_eq!(title.status, Status::Ok);
    assert!(title.notes.contains("Example Domain"));

    assert_eq!(find(&results, "meta_description").status, Status::Ok);

    let canonical = find(&results, "canonical");
    assert_eq!(canonical.status, Status::Ok);
    assert!(canonical.notes.contains("https://example.com/"));

    let h1 = find(&results, "h1_presence");
    assert_eq!(h1.status, Status::Ok);
    assert!(h1.notes.contains("Example Heading"));

    let words = find(&results, "word_count");
    assert_eq!(words.status, Status::Ok);
    let count: usize = words.notes.split_whitespace().next().unwrap().parse().unwrap();
    assert!(count > 5);

    let alt = find(&results, "links_alt_text");
    assert_eq!(alt.status, Status::Warn);
    assert!(alt.notes.starts_with("1 image"));
}

#[test]
fn test_inspector_run_all_follows_builtin_order() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));
    let names: Vec<String> = inspector.run_all(None).unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, BUILTIN_ORDER.to_vec());
}

#[test]
fn test_inspector_unknown_identity() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));

    for identity in ["og_image", "", "TITLE_X", "hreflang"] {
        let result = inspector.run_one(identity, None).unwrap();
        assert_eq!(result.status, Status::Unknown);
        assert!(!result.name.is_empty());
    }
}

#[test]
fn test_inspector_run_one_is_idempotent() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));

    for identity in BUILTIN_ORDER {
        let first = inspector.run_one(identity, None).unwrap();
        let second = inspector.run_one(identity, None).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_inspector_explicit_document_overrides_held_one() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));
    let other = Document::new("<title>Other</title>");

    assert_eq!(inspector.run_one("title", Some(&other)).unwrap().notes, "Other");
    // The held document is untouched
    assert_eq!(inspector.run_one("title", None).unwrap().notes, "Example Domain");
}

#[test]
fn test_inspector_plugin_cannot_shadow_builtin() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));
    inspector
        .register_plugin(MockPlugin::boxed("Title", Status::Error, "impostor"))
        .unwrap();

    let result = inspector.run_one("title", None).unwrap();
    assert_eq!(result.status, Status::Ok);
    assert!(result.notes.contains("Example Domain"));

    let report = inspector.run_report(None).unwrap();
    assert_eq!(report.get("title").unwrap().notes, "Example Domain");
    assert_eq!(report.iter().filter(|r| r.name == "title").count(), 1);
}

#[test]
fn test_inspector_plugins_appended_and_reported() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));
    inspector
        .register_plugin(MockPlugin::boxed("og_image", Status::Warn, "missing"))
        .unwrap();

    let results = inspector.run_all(None).unwrap();
    assert_eq!(results.len(), BUILTIN_ORDER.len() + 1);
    assert_eq!(results.last().unwrap().name, "og_image");

    let plugins = inspector.run_plugins(None).unwrap();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins["og_image"].status, Status::Warn);
}

#[test]
fn test_inspector_faulty_plugin_does_not_abort_run() {
    let inspector = Inspector::with_document(test_config(), Document::new(EXAMPLE_PAGE));
    inspector.register_plugin(Box::new(PanickingPlugin)).unwrap();

    let results = inspector.run_all(None).unwrap();
    assert_eq!(results.len(), BUILTIN_ORDER.len() + 1);

    let faulty = find(&results, "panicky");
    assert_eq!(faulty.status, Status::Error);
    assert!(faulty.notes.contains("plugin bug"));
    assert_eq!(find(&results, "title").status, Status::Ok);
}

#[test]
fn test_inspector_manifest_plugins_from_config() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "og_title.yaml",
        "plugin: {name: og_title}\nrule: {kind: selector, selector: 'meta[property=\"og:title\"]', attribute: content}\n",
    );

    let config = InspectorConfig {
        plugin_paths: vec![dir.path().to_path_buf()],
        ..test_config()
    };
    let page = r#"<head><meta property="og:title" content="Shared"></head>"#;
    let inspector = Inspector::with_document(config, Document::new(page));

    let result = inspector.run_one("og_title", None).unwrap();
    assert_eq!(result, CheckResult::ok("og_title", "Shared"));
    assert!(inspector.check_names().contains(&"og_title".to_string()));
}

#[test]
fn test_inspector_lazy_fetch_happens_once() {
    let fetcher = MockFetcher::new().with_page("https://example.com/", EXAMPLE_PAGE);
    let calls = fetcher.counter();
    let inspector = Inspector::with_source(test_config(), "https://example.com/").with_fetcher(fetcher);

    assert_eq!(inspector.state(), InspectorState::Created);
    inspector.run_one("title", None).unwrap();
    inspector.run_one("canonical", None).unwrap();
    inspector.run_all(None).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(inspector.document().unwrap().locator(), Some("https://example.com/"));
}

#[test]
fn test_inspector_concurrent_first_callers_share_fetch() {
    let fetcher = MockFetcher::new()
        .with_page("https://example.com/", EXAMPLE_PAGE)
        .with_delay(50);
    let calls = fetcher.counter();
    let inspector = Arc::new(Inspector::with_source(test_config(), "https://example.com/").with_fetcher(fetcher));

    std::thread::scope(|s| {
        for identity in ["title", "links", "headings", "viewport"] {
            let inspector = Arc::clone(&inspector);
            s.spawn(move || {
                let result = inspector.run_one(identity, None).unwrap();
                assert_eq!(result.name, identity);
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_inspector_new_source_invalidates_document() {
    let fetcher = MockFetcher::new()
        .with_page("https://a.test/", "<title>A</title>")
        .with_page("https://b.test/", "<title>B</title>");
    let calls = fetcher.counter();
    let inspector = Inspector::with_source(test_config(), "https://a.test/").with_fetcher(fetcher);

    assert_eq!(inspector.run_one("title", None).unwrap().notes, "A");
    assert_eq!(inspector.state(), InspectorState::DocumentAcquired);

    inspector.set_source("https://b.test/");
    assert_eq!(inspector.run_all(None).unwrap()[0].notes, "B");
    assert_eq!(inspector.state(), InspectorState::ResultsAvailable);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_inspector_fetch_failure_propagates_from_run_one() {
    let inspector = Inspector::with_source(test_config(), "https://down.test/").with_fetcher(MockFetcher::new());
    assert!(matches!(inspector.run_one("title", None), Err(PageDocError::Fetch(_))));
}

#[test]
fn test_inspector_run_url_recovers_after_failure() {
    let fetcher = MockFetcher::new().with_page("https://example.com/", EXAMPLE_PAGE);
    let inspector = Inspector::new(test_config()).with_fetcher(fetcher);

    let failed = inspector.run_url("https://unreachable.test/");
    assert!(failed.is_error());
    assert!(failed.error().unwrap().contains("unreachable.test"));

    let succeeded = inspector.run_url("https://example.com/");
    let report = succeeded.report().unwrap();
    assert_eq!(report.len(), BUILTIN_ORDER.len());
    assert_eq!(report["title"].notes, "Example Domain");

    // The links check now knows the document host
    assert!(report["links"].notes.contains("internal: 1"));
}

#[test]
fn test_inspector_failed_run_url_keeps_held_document() {
    let fetcher = MockFetcher::new().with_page("https://example.com/", EXAMPLE_PAGE);
    let inspector =
        Inspector::with_document(test_config(), Document::new("<title>Held</title>")).with_fetcher(fetcher);

    assert!(inspector.run_url("https://down.test/").is_error());
    assert_ne!(inspector.source().as_deref(), Some("https://down.test/"));
    assert_eq!(inspector.run_one("title", None).unwrap().notes, "Held");

    // A later success still replaces it
    assert!(!inspector.run_url("https://example.com/").is_error());
    assert_eq!(inspector.source().as_deref(), Some("https://example.com/"));
    assert_eq!(inspector.run_one("title", None).unwrap().notes, "Example Domain");
}

#[test]
fn test_inspector_run_url_serializes_both_shapes() {
    let fetcher = MockFetcher::new().with_page("https://example.com/", "<title>T</title>");
    let inspector = Inspector::new(test_config()).with_fetcher(fetcher);

    let error = serde_json::to_value(inspector.run_url("https://nope.test/")).unwrap();
    assert!(error.get("error").is_some());

    let ok = serde_json::to_value(inspector.run_url("https://example.com/")).unwrap();
    assert_eq!(ok["title"]["status"], "ok");
    assert_eq!(ok["title"]["notes"], "T");
}

#[test]
fn test_inspector_batch_of_documents() {
    let inspector = Inspector::new(test_config());
    let documents = vec![
        Document::new("<title>One</title>"),
        Document::new("<p>no title here</p>"),
    ];

    let reports = inspector.run_batch(&documents);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].get("title").unwrap().status, Status::Ok);
    assert_eq!(reports[1].get("title").unwrap().status, Status::Error);
}
