//! Page content checks.
//!
//! Checks for the primary heading, visible word count, heading structure and
//! embedded JSON-LD structured data.

use super::html::{self, attr_lower, element_text, selector};
use super::CheckFault;
use crate::document::Document;
use crate::CheckResult;

/// Elements whose text is never visible page copy
const INVISIBLE_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Run h1_presence: at least one `<h1>` with text
pub fn check_h1_presence(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());
    let h1 = selector("h1")?;

    let first = page
        .select(&h1)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty());

    match first {
        Some(text) => Ok(CheckResult::ok("h1_presence", text)),
        None => Ok(CheckResult::warn("h1_presence", "missing")),
    }
}

/// Run word_count: count words of visible text
pub fn check_word_count(document: &Document) -> Result<CheckResult, CheckFault> {
    let count = count_visible_words(document.content());

    if count > 0 {
        Ok(CheckResult::ok("word_count", format!("{} words", count)))
    } else {
        Ok(CheckResult::warn("word_count", "0 words"))
    }
}

/// Count whitespace-separated tokens containing at least one alphanumeric
/// character, skipping script, style and head content.
pub fn count_visible_words(content: &str) -> usize {
    let page = html::parse(content);

    page.root_element()
        .descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| INVISIBLE_ELEMENTS.contains(&el.name()))
                    .unwrap_or(false)
            })
        })
        .map(|(_, text)| {
            text.split_whitespace()
                .filter(|word| word.chars().any(char::is_alphanumeric))
                .count()
        })
        .sum()
}

/// Run structured_data: count `<script type="application/ld+json">` blocks
pub fn check_structured_data(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());
    let scripts = selector("script[type]")?;

    let blocks: Vec<String> = page
        .select(&scripts)
        .filter(|el| attr_lower(el, "type").as_deref() == Some("application/ld+json"))
        .map(|el| el.text().collect::<String>())
        .collect();

    if blocks.is_empty() {
        return Ok(CheckResult::warn("structured_data", "0 JSON-LD blocks"));
    }

    let invalid = blocks
        .iter()
        .filter(|body| serde_json::from_str::<serde_json::Value>(body).is_err())
        .count();

    let mut notes = format!("{} JSON-LD block{}", blocks.len(), plural(blocks.len()));
    if invalid > 0 {
        notes.push_str(&format!(" ({} not valid JSON)", invalid));
    }
    Ok(CheckResult::ok("structured_data", notes))
}

/// Run headings: per-level counts of h1..h6
pub fn check_headings(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());

    let mut counts = Vec::new();
    for level in 1..=6 {
        let heading = selector(&format!("h{}", level))?;
        let count = page.select(&heading).count();
        if count > 0 {
            counts.push(format!("h{}: {}", level, count));
        }
    }

    if counts.is_empty() {
        Ok(CheckResult::warn("headings", "no headings"))
    } else {
        Ok(CheckResult::ok("headings", counts.join(", ")))
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
