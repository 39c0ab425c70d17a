//! Page documents.
//!
//! A `Document` is the immutable page content a set of checks runs against,
//! plus the locator it was fetched from (if any). Content is reference
//! counted so one acquisition can be shared by every check, including checks
//! evaluated on worker threads.

use std::fmt;
use std::sync::Arc;

/// One fetched or injected page.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    content: Arc<str>,
    locator: Option<String>,
}

impl Document {
    /// Create a document with no known origin
    pub fn new(content: impl Into<String>) -> Self {
        Document {
            content: Arc::from(content.into()),
            locator: None,
        }
    }

    /// Create a document that remembers where it came from
    pub fn with_locator(content: impl Into<String>, locator: impl Into<String>) -> Self {
        Document {
            content: Arc::from(content.into()),
            locator: Some(locator.into()),
        }
    }

    /// Raw page text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Source locator (URL, path, or other identifier)
    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    /// Lower-cased host of the locator, when it is an absolute URL.
    pub fn host(&self) -> Option<String> {
        self.locator.as_deref().and_then(host_of)
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("locator", &self.locator)
            .field("bytes", &self.content.len())
            .finish()
    }
}

/// Extract the host from an absolute `scheme://host[:port]/...` locator.
///
/// Returns `None` for relative references, `mailto:` and other schemes
/// without an authority component. Userinfo and port are stripped and the
/// result is lower-cased.
pub fn host_of(locator: &str) -> Option<String> {
    let trimmed = locator.trim();
    let rest = if let Some(idx) = trimmed.find("://") {
        let scheme = &trimmed[..idx];
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
            return None;
        }
        &trimmed[idx + 3..]
    } else if let Some(stripped) = trimmed.strip_prefix("//") {
        stripped
    } else {
        return None;
    };

    let authority = rest
        .split(|c: char| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");
    let authority = authority.rsplit('@').next().unwrap_or(authority);

    let host = if authority.starts_with('[') {
        // IPv6 literal
        authority.split(']').next().map(|h| format!("{}]", h))?
    } else {
        authority.split(':').next().unwrap_or("").to_string()
    };

    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}
