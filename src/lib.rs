//! page-doc library
//!
//! On-page web diagnostics with a pluggable check registry.
//!
//! This library provides:
//! - Built-in on-page checks (title, meta description, canonical, robots,
//!   viewport, headings, word count, image alt text, structured data, links)
//! - A plugin registry fed by compiled-in factories and YAML/JSON manifests
//! - An inspection engine that resolves check names, evaluates checks against
//!   one immutable document, and aggregates a report
//! - Text and structured (JSON) report rendering
//!
//! # Example
//!
//! ```no_run
//! use page_doc::{Document, Inspector, InspectorConfig};
//!
//! let doc = Document::new("<html><head><title>Example</title></head></html>");
//! let inspector = Inspector::with_document(InspectorConfig::default(), doc);
//! let results = inspector.run_all(None).expect("document was injected");
//! for result in &results {
//!     println!("{}", result);
//! }
//! ```

pub mod checks;
pub mod config;
pub mod document;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod output;
pub mod plugin;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Re-exports for public API
pub use checks::Check;
pub use config::{AggregationOrder, ConfigError, InspectorConfig};
pub use document::Document;
pub use engine::inspector::{Inspector, InspectorState, UrlOutcome};
pub use engine::report::{Report, ReportAggregator, ReportSummary};
pub use fetch::{Fetch, FetchError};
pub use output::OutputFormat;
pub use plugin::{Plugin, PluginLoadError, PluginRegistry};

/// Outcome class of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Signal present and acceptable
    Ok,
    /// Signal missing or of low quality
    #[serde(alias = "missing")]
    Warn,
    /// Check could not be evaluated, or a required signal is absent
    Error,
    /// Requested name resolves to no built-in check and no plugin
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warn => "warn",
            Status::Error => "error",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one check against one document.
///
/// `name` is the lower-cased identity the check was resolved under and is
/// never empty. `notes` is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    #[serde(default)]
    pub notes: String,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, status: Status, notes: impl Into<String>) -> Self {
        let name = normalize_name(&name.into());
        CheckResult {
            name: if name.is_empty() { "unnamed".to_string() } else { name },
            status,
            notes: notes.into(),
        }
    }

    pub fn ok(name: impl Into<String>, notes: impl Into<String>) -> Self {
        Self::new(name, Status::Ok, notes)
    }

    pub fn warn(name: impl Into<String>, notes: impl Into<String>) -> Self {
        Self::new(name, Status::Warn, notes)
    }

    pub fn error(name: impl Into<String>, notes: impl Into<String>) -> Self {
        Self::new(name, Status::Error, notes)
    }

    /// Result for a name that matches neither a built-in check nor a plugin
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(name, Status::Unknown, "no built-in check or plugin with this name")
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.notes.is_empty() {
            write!(f, "[{}] {}", self.status, self.name)
        } else {
            write!(f, "[{}] {}: {}", self.status, self.name, self.notes)
        }
    }
}

/// Normalize a check identity for keying: trimmed and lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Error types for page-doc operations.
///
/// Only document acquisition surfaces as a hard error; check faults, unknown
/// names and plugin load failures are downgraded to results or diagnostics.
#[derive(Debug, Error)]
pub enum PageDocError {
    /// The document could not be fetched
    #[error("failed to acquire document: {0}")]
    Fetch(#[from] FetchError),

    /// No document was injected and no source locator is known
    #[error("no document and no source locator to fetch one from")]
    NoSource,

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Inspect an already acquired document with every built-in check and every
/// plugin reachable from `config`, returning the merged keyed report.
///
/// # Example
///
/// ```no_run
/// use page_doc::{inspect, Document, InspectorConfig};
///
/// let doc = Document::with_locator("<title>Home</title>", "https://example.com/");
/// let report = inspect(InspectorConfig::default(), doc);
/// println!("{} checks ok", report.summary().ok);
/// ```
pub fn inspect(config: InspectorConfig, document: Document) -> Report {
    let inspector = Inspector::with_document(config, document);
    // An injected document can never fail acquisition.
    match inspector.run_report(None) {
        Ok(report) => report,
        Err(e) => {
            log::error!("inspection failed: {}", e);
            Report::default()
        }
    }
}
