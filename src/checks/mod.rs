//! On-page check modules.
//!
//! This module contains the `Check` contract and all built-in checks,
//! organized by the part of the page they inspect:
//! - Head: title, meta description, canonical, robots, viewport
//! - Content: h1 presence, word count, heading structure, structured data
//! - Links: image alt text coverage, anchor quality
//!
//! # Graceful Degradation
//!
//! All checks follow these rules:
//! - Empty or malformed document: evaluate normally (usually `warn`/`error`)
//! - Selector failure: `CheckResult` with `error` status
//! - Panic inside a check: caught by [`evaluate_guarded`], `error` status
//!
//! Checks never perform I/O and never mutate the document, so any subset of
//! them can be evaluated in any order or in parallel.

pub mod content;
pub mod head;
pub mod html;
pub mod links;

use crate::document::Document;
use crate::{normalize_name, CheckResult, Status};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;

/// A single pure evaluator producing one named result from a document.
pub trait Check: Send + Sync {
    /// Stable, non-empty identity
    fn name(&self) -> &str;

    /// Evaluate against a document. Must not panic; internal faults should be
    /// reported as a result with `error` status.
    fn evaluate(&self, document: &Document) -> CheckResult;
}

/// Internal fault raised while evaluating a built-in check.
#[derive(Debug, Error)]
pub enum CheckFault {
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// Built-in identities in the order `run_all` evaluates them.
pub const BUILTIN_ORDER: [&str; 11] = [
    "title",
    "meta_description",
    "canonical",
    "robots_meta",
    "viewport",
    "h1_presence",
    "word_count",
    "links_alt_text",
    "structured_data",
    "headings",
    "links",
];

/// A compiled-in check with its evaluation function
pub struct BuiltinCheck {
    pub name: &'static str,
    pub description: &'static str,
    pub check_fn: fn(&Document) -> Result<CheckResult, CheckFault>,
}

impl Check for BuiltinCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(&self, document: &Document) -> CheckResult {
        match (self.check_fn)(document) {
            Ok(result) => result,
            Err(fault) => CheckResult::error(self.name, fault.to_string()),
        }
    }
}

/// Create all built-in checks, in [`BUILTIN_ORDER`]
pub fn create_builtin_checks() -> Vec<BuiltinCheck> {
    vec![
        BuiltinCheck {
            name: "title",
            description: "Page has a non-empty <title>",
            check_fn: head::check_title,
        },
        BuiltinCheck {
            name: "meta_description",
            description: "Page has a non-empty meta description",
            check_fn: head::check_meta_description,
        },
        BuiltinCheck {
            name: "canonical",
            description: "Page declares a canonical link with an href",
            check_fn: head::check_canonical,
        },
        BuiltinCheck {
            name: "robots_meta",
            description: "Page has a robots meta directive",
            check_fn: head::check_robots_meta,
        },
        BuiltinCheck {
            name: "viewport",
            description: "Page has a viewport meta tag",
            check_fn: head::check_viewport,
        },
        BuiltinCheck {
            name: "h1_presence",
            description: "Page has at least one <h1> with text",
            check_fn: content::check_h1_presence,
        },
        BuiltinCheck {
            name: "word_count",
            description: "Count visible words in the page body",
            check_fn: content::check_word_count,
        },
        BuiltinCheck {
            name: "links_alt_text",
            description: "Every image has a non-empty alt attribute",
            check_fn: links::check_image_alt_text,
        },
        BuiltinCheck {
            name: "structured_data",
            description: "Page embeds at least one JSON-LD block",
            check_fn: content::check_structured_data,
        },
        BuiltinCheck {
            name: "headings",
            description: "Count headings per level",
            check_fn: content::check_headings,
        },
        BuiltinCheck {
            name: "links",
            description: "Classify anchors as internal/external and flag vague anchor text",
            check_fn: links::check_links,
        },
    ]
}

/// Fixed dispatch table of built-in checks, keyed by identity.
pub struct BuiltinTable {
    checks: Vec<BuiltinCheck>,
}

impl BuiltinTable {
    pub fn new() -> Self {
        BuiltinTable {
            checks: create_builtin_checks(),
        }
    }

    /// Look up a built-in by identity (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&BuiltinCheck> {
        let key = normalize_name(name);
        self.checks.iter().find(|c| c.name == key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Identities in evaluation order
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuiltinCheck> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate a check with fault isolation.
///
/// Panics are caught and converted to an `error` result. The returned result
/// is always keyed under `identity`, whatever name the check reported.
pub fn evaluate_guarded<C: Check + ?Sized>(check: &C, identity: &str, document: &Document) -> CheckResult {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| check.evaluate(document)));
    let elapsed_us = start.elapsed().as_micros();

    match outcome {
        Ok(mut result) => {
            let key = normalize_name(identity);
            if !key.is_empty() && result.name != key {
                result.name = key;
            }
            log::debug!("check {} -> {} in {}us", result.name, result.status, elapsed_us);
            result
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!("check {} panicked: {}", identity, message);
            CheckResult::new(identity, Status::Error, format!("check panicked: {}", message))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
