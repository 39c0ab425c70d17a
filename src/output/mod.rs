//! Report rendering.
//!
//! Provides a text formatter (`[status] name: notes`, one line per check) and
//! a structured JSON formatter for the keyed report.
//!
//! Both formatters produce valid output for any report, including an empty
//! one. No function in this module will panic.

use crate::config::InspectorConfig;
use crate::engine::report::Report;
use crate::Status;
use serde::{Deserialize, Serialize};

/// Rendering mode selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    #[serde(alias = "json")]
    Structured,
}

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a report into a string
    fn format(&self, report: &Report) -> String;
}

/// Human-readable formatter
pub struct TextFormatter {
    color: bool,
    quiet: bool,
}

impl TextFormatter {
    pub fn new(color: bool, quiet: bool) -> Self {
        TextFormatter { color, quiet }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn status_tag(&self, status: Status) -> String {
        let tag = format!("[{}]", status);
        match status {
            Status::Ok => self.colorize(&tag, "32"),
            Status::Warn => self.colorize(&tag, "33"),
            Status::Error => self.colorize(&tag, "31"),
            Status::Unknown => self.colorize(&tag, "90"),
        }
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &Report) -> String {
        let mut output = String::new();

        // Stable sorted order regardless of evaluation order
        for (identity, result) in report.to_map() {
            // Skip passing checks in quiet mode
            if self.quiet && result.status == Status::Ok {
                continue;
            }

            output.push_str(&self.status_tag(result.status));
            output.push(' ');
            output.push_str(&identity);
            if !result.notes.is_empty() {
                output.push_str(": ");
                output.push_str(&result.notes);
            }
            output.push('\n');
        }

        let summary = report.summary();
        output.push_str(&format!(
            "SUMMARY: {} ok, {} warnings, {} errors, {} unknown ({} checks)",
            summary.ok, summary.warn, summary.error, summary.unknown, summary.total
        ));

        output
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };

        // A map of plain strings cannot fail to serialize; keep the output
        // valid JSON regardless.
        rendered.unwrap_or_else(|e| {
            log::error!("failed to serialize report: {}", e);
            "{}".to_string()
        })
    }
}

/// Get a formatter based on the output format
pub fn get_formatter(format: OutputFormat, pretty: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::default()),
        OutputFormat::Structured => Box::new(JsonFormatter::new(pretty)),
    }
}

/// Render `report` with the format selected in `config`
pub fn render(report: &Report, config: &InspectorConfig) -> String {
    get_formatter(config.output, config.pretty).format(report)
}
