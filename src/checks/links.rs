//! Link and image checks.
//!
//! Checks image alt text coverage and classifies anchors by destination and
//! anchor text quality.

use super::html::{self, collapse_whitespace, element_text, selector};
use super::CheckFault;
use crate::document::{host_of, Document};
use crate::CheckResult;

/// Anchor texts that say nothing about the destination (exact match after
/// whitespace collapse and lower-casing)
pub const LOW_QUALITY_ANCHOR_TEXT: [&str; 5] = ["click here", "read more", "link", "here", "details"];

/// Anchor statistics for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
    pub low_quality: usize,
}

/// Run links_alt_text: every `<img>` carries a non-empty alt attribute
pub fn check_image_alt_text(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());
    let images = selector("img")?;

    let mut total = 0;
    let mut missing = 0;
    for img in page.select(&images) {
        total += 1;
        let has_alt = img
            .value()
            .attr("alt")
            .map(|alt| !alt.trim().is_empty())
            .unwrap_or(false);
        if !has_alt {
            missing += 1;
        }
    }

    let notes = format!(
        "{} image{} missing alt ({} total)",
        missing,
        if missing == 1 { "" } else { "s" },
        total
    );
    if missing > 0 {
        Ok(CheckResult::warn("links_alt_text", notes))
    } else {
        Ok(CheckResult::ok("links_alt_text", notes))
    }
}

/// Run links: classify every `<a href>` as internal or external and count
/// low-quality anchor texts
pub fn check_links(document: &Document) -> Result<CheckResult, CheckFault> {
    let stats = collect_link_stats(document)?;

    let notes = format!(
        "total: {}, internal: {}, external: {}, low-quality anchors: {}",
        stats.total, stats.internal, stats.external, stats.low_quality
    );
    if stats.external > 0 || stats.low_quality > 0 {
        Ok(CheckResult::warn("links", notes))
    } else {
        Ok(CheckResult::ok("links", notes))
    }
}

/// Gather anchor statistics.
///
/// An href is internal when it has no host of its own (relative, fragment,
/// `mailto:` and similar) or when its host equals the document's host.
pub fn collect_link_stats(document: &Document) -> Result<LinkStats, CheckFault> {
    let page = html::parse(document.content());
    let anchors = selector("a[href]")?;
    let page_host = document.host();

    let mut stats = LinkStats::default();
    for anchor in page.select(&anchors) {
        stats.total += 1;

        let href = anchor.value().attr("href").unwrap_or("");
        match host_of(href) {
            Some(host) if Some(&host) != page_host.as_ref() => stats.external += 1,
            _ => stats.internal += 1,
        }

        if is_low_quality_anchor(&element_text(&anchor)) {
            stats.low_quality += 1;
        }
    }

    Ok(stats)
}

pub fn is_low_quality_anchor(text: &str) -> bool {
    let normalized = collapse_whitespace(text).to_lowercase();
    LOW_QUALITY_ANCHOR_TEXT.contains(&normalized.as_str())
}
