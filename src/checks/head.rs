//! Document head checks.
//!
//! Checks for the title, meta description, canonical link, robots directive
//! and viewport declaration.

use super::html::{self, attr_lower, element_text, find_meta, selector};
use super::CheckFault;
use crate::document::Document;
use crate::CheckResult;

/// Run title: a `<title>` with non-empty text
pub fn check_title(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());
    let title = selector("title")?;

    let mut saw_title = false;
    for el in page.select(&title) {
        saw_title = true;
        let text = element_text(&el);
        if !text.is_empty() {
            return Ok(CheckResult::ok("title", text));
        }
    }

    if saw_title {
        Ok(CheckResult::error("title", "title element is empty"))
    } else {
        Ok(CheckResult::error("title", "no title element"))
    }
}

/// Run meta_description: `<meta name="description">` with non-empty content
pub fn check_meta_description(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());

    match find_meta(&page, "description")? {
        Some(el) => {
            let content = html::collapse_whitespace(el.value().attr("content").unwrap_or(""));
            if content.is_empty() {
                Ok(CheckResult::warn("meta_description", "description meta tag has empty content"))
            } else {
                Ok(CheckResult::ok("meta_description", content))
            }
        }
        None => Ok(CheckResult::warn("meta_description", "missing")),
    }
}

/// Run canonical: `<link rel="canonical" href="...">`
pub fn check_canonical(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());
    let links = selector("link[rel]")?;

    let canonical = page.select(&links).find(|el| {
        attr_lower(el, "rel")
            .map(|rel| rel.split_whitespace().any(|token| token == "canonical"))
            .unwrap_or(false)
    });

    match canonical {
        Some(el) => {
            let href = el.value().attr("href").map(str::trim).unwrap_or("");
            if href.is_empty() {
                Ok(CheckResult::warn("canonical", "canonical link has no href"))
            } else {
                Ok(CheckResult::ok("canonical", href))
            }
        }
        None => Ok(CheckResult::warn("canonical", "missing")),
    }
}

/// Run robots_meta: `<meta name="robots">`, notes carry the directive
pub fn check_robots_meta(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());

    match find_meta(&page, "robots")? {
        Some(el) => {
            let directive = html::collapse_whitespace(el.value().attr("content").unwrap_or(""));
            if directive.is_empty() {
                Ok(CheckResult::ok("robots_meta", "present"))
            } else {
                Ok(CheckResult::ok("robots_meta", directive))
            }
        }
        None => Ok(CheckResult::warn("robots_meta", "missing")),
    }
}

/// Run viewport: `<meta name="viewport">`
pub fn check_viewport(document: &Document) -> Result<CheckResult, CheckFault> {
    let page = html::parse(document.content());

    if find_meta(&page, "viewport")?.is_some() {
        Ok(CheckResult::ok("viewport", "present"))
    } else {
        Ok(CheckResult::warn("viewport", "missing"))
    }
}
