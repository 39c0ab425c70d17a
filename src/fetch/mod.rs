//! Document acquisition.
//!
//! The engine only depends on the [`Fetch`] trait. The default implementation
//! is [`HttpClient`], a small HTTP/1.1 client; HTTPS needs the `tls` feature.
//! Timeouts and retries are the fetcher's business, not the engine's.

pub mod client;

pub use client::{HttpClient, HttpConfig, HttpResponse};

use thiserror::Error;

/// Fetch collaborator: turns a locator into page content.
pub trait Fetch: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<String, FetchError>;
}

/// Error while acquiring a document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid locator '{0}'")]
    InvalidLocator(String),

    #[error("connection to {locator} failed: {message}")]
    Connect { locator: String, message: String },

    #[error("timed out reading {locator}")]
    Timeout { locator: String },

    #[error("{locator} returned HTTP {status}")]
    Status { locator: String, status: u16 },

    #[error("malformed response from {locator}: {message}")]
    Parse { locator: String, message: String },

    #[error("too many redirects fetching {locator} (limit {limit})")]
    TooManyRedirects { locator: String, limit: u32 },

    #[error("https is not available for {0}: built without the 'tls' feature")]
    TlsUnavailable(String),

    #[error("fetcher panicked while reading {locator}: {message}")]
    Panicked { locator: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Connect { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Supported locator schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    File,
}

/// A locator split into the parts the client needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path plus query, always starting with `/` (or the file path)
    pub path: String,
}

impl Locator {
    /// Parse `http://`, `https://` and `file://` locators
    pub fn parse(locator: &str) -> Result<Self, FetchError> {
        let invalid = || FetchError::InvalidLocator(locator.to_string());
        let trimmed = locator.trim();

        let (scheme_str, rest) = trimmed.split_once("://").ok_or_else(invalid)?;
        let scheme = match scheme_str.to_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            "file" => Scheme::File,
            _ => return Err(invalid()),
        };

        if scheme == Scheme::File {
            if rest.is_empty() {
                return Err(invalid());
            }
            return Ok(Locator {
                scheme,
                host: String::new(),
                port: 0,
                path: rest.to_string(),
            });
        }

        // Fragments never go on the wire
        let rest = rest.split('#').next().unwrap_or("");
        let (authority, path) = match rest.find(|c: char| c == '/' || c == '?') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let path = if path.starts_with('?') {
            format!("/{}", path)
        } else {
            path.to_string()
        };

        let default_port = if scheme == Scheme::Https { 443 } else { 80 };
        let (host, port_str) = if authority.starts_with('[') {
            // IPv6 literal
            let end = authority.find(']').ok_or_else(invalid)?;
            let port = authority[end + 1..].strip_prefix(':');
            (&authority[..=end], port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };
        let port = match port_str {
            Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
            None => default_port,
        };
        let host = host.to_string();

        if host.is_empty() || host.contains('@') {
            return Err(invalid());
        }

        Ok(Locator {
            scheme,
            host: host.to_lowercase(),
            port,
            path,
        })
    }

    /// `scheme://host[:port]` without the path
    pub fn origin(&self) -> String {
        let scheme = match self.scheme {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::File => return "file://".to_string(),
        };
        let default_port = if self.scheme == Scheme::Https { 443 } else { 80 };
        if self.port == default_port {
            format!("{}://{}", scheme, self.host)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }

    /// Resolve a redirect target against this locator
    pub fn resolve(&self, target: &str) -> String {
        if target.contains("://") {
            target.to_string()
        } else if let Some(rest) = target.strip_prefix("//") {
            let scheme = if self.scheme == Scheme::Https { "https" } else { "http" };
            format!("{}://{}", scheme, rest)
        } else if target.starts_with('/') {
            format!("{}{}", self.origin(), target)
        } else {
            let base = self.path.split('?').next().unwrap_or("/");
            let dir = match base.rfind('/') {
                Some(idx) => &base[..=idx],
                None => "/",
            };
            format!("{}{}{}", self.origin(), dir, target)
        }
    }
}
