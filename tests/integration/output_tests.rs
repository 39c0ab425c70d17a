//! Output formatting integration tests.

use crate::mocks::{MockPlugin, EXAMPLE_PAGE};
use page_doc::output::{get_formatter, render, JsonFormatter, OutputFormatter, TextFormatter};
use page_doc::{CheckResult, Document, Inspector, InspectorConfig, OutputFormat, Report, Status};
use pretty_assertions::assert_eq;

fn example_report() -> Report {
    let config = InspectorConfig {
        use_default_plugin_paths: false,
        ..InspectorConfig::default()
    };
    let inspector = Inspector::with_document(config, Document::new(EXAMPLE_PAGE));
    inspector
        .register_plugin(MockPlugin::boxed("og_image", Status::Warn, "missing"))
        .unwrap();
    inspector.run_report(None).unwrap()
}

#[test]
fn test_text_output_one_line_per_check() {
    let report = example_report();
    let output = TextFormatter::default().format(&report);
    let lines: Vec<&str> = output.lines().collect();

    // 11 built-ins, one plugin, one summary line
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[0], "[ok] canonical: https://example.com/");
    assert!(lines.contains(&"[warn] og_image: missing"));
    assert!(lines.contains(&"[ok] title: Example Domain"));
    assert!(lines[12].starts_with("SUMMARY: "));
}

#[test]
fn test_text_output_sorted_regardless_of_order() {
    let forward: Report = vec![CheckResult::ok("a", "1"), CheckResult::ok("b", "2")].into_iter().collect();
    let backward: Report = vec![CheckResult::ok("b", "2"), CheckResult::ok("a", "1")].into_iter().collect();

    let formatter = TextFormatter::default();
    assert_eq!(formatter.format(&forward), formatter.format(&backward));
}

#[test]
fn test_structured_output_round_trips_results() {
    let report = example_report();
    let output = JsonFormatter::new(false).format(&report);

    let parsed: std::collections::BTreeMap<String, CheckResult> = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed, report.to_map());
    assert_eq!(parsed["links_alt_text"].status, Status::Warn);
}

#[test]
fn test_formatter_selection() {
    let report = example_report();

    let text = get_formatter(OutputFormat::Text, false).format(&report);
    assert!(text.starts_with('['));

    let pretty = get_formatter(OutputFormat::Structured, true).format(&report);
    assert!(pretty.contains("\n  \"canonical\""));

    let config = InspectorConfig {
        output: OutputFormat::Structured,
        ..InspectorConfig::default()
    };
    assert_eq!(render(&report, &config), JsonFormatter::new(false).format(&report));
}
