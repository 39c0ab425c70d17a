//! Mock fetch collaborator.

use page_doc::{Fetch, FetchError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serves canned pages by locator and counts every fetch
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    calls: Arc<AtomicUsize>,
    delay_ms: u64,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, locator: &str, content: &str) -> Self {
        self.pages.insert(locator.to_string(), content.to_string());
        self
    }

    /// Sleep before answering, to widen race windows
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Shared call counter; stays valid after the fetcher is moved
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Fetch for MockFetcher {
    fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
        }

        self.pages.get(locator).cloned().ok_or_else(|| FetchError::Connect {
            locator: locator.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// The page used throughout the integration tests
pub const EXAMPLE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Example Domain</title>
  <meta name="description" content="An example page for inspection tests">
  <link rel="canonical" href="https://example.com/">
  <meta name="robots" content="index, follow">
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <h1>Example Heading</h1>
  <p>This domain is for use in illustrative examples in documents.</p>
  <img src="/logo.png" alt="Example logo">
  <img src="/banner.png">
  <a href="/about">About this site</a>
</body>
</html>"#;
