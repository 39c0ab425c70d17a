//! Shared HTML helpers for built-in checks.

use super::CheckFault;
use scraper::{ElementRef, Html, Selector};

/// Parse a document body. Parsing is lenient and never fails.
pub fn parse(content: &str) -> Html {
    Html::parse_document(content)
}

/// Compile a CSS selector
pub fn selector(css: &str) -> Result<Selector, CheckFault> {
    Selector::parse(css).map_err(|e| CheckFault::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Element text with runs of whitespace collapsed to single spaces
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive, trimmed attribute value
pub fn attr_lower(element: &ElementRef<'_>, name: &str) -> Option<String> {
    element.value().attr(name).map(|v| v.trim().to_lowercase())
}

/// First `<meta>` whose `name` attribute equals `name` (case-insensitive)
pub fn find_meta<'a>(document: &'a Html, name: &str) -> Result<Option<ElementRef<'a>>, CheckFault> {
    let meta = selector("meta[name]")?;
    Ok(document
        .select(&meta)
        .find(|el| attr_lower(el, "name").as_deref() == Some(name)))
}
