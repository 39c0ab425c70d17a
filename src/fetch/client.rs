//! Minimal HTTP client for page fetching.
//!
//! This module provides a simple HTTP/1.1 GET client built on the standard
//! library. HTTPS support requires the "tls" feature, which brings in rustls.
//!
//! # Design Notes
//!
//! - Uses std::net::TcpStream for raw TCP connections
//! - Implements the small subset of HTTP/1.1 needed to fetch one page
//! - Follows redirects up to a configurable limit
//! - Retries transient failures with exponential backoff

use super::{Fetch, FetchError, Locator, Scheme};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// HTTP response from the server
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Check if the response indicates success (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Get a header value by name (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, v)| v.as_str())
    }
}

/// Configuration for HTTP requests
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Maximum retry attempts
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
    /// Redirects followed before giving up
    pub max_redirects: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            connect_timeout_ms: 10000,
            read_timeout_ms: 30000,
            max_retries: 2,
            retry_delay_ms: 500,
            max_redirects: 5,
            user_agent: concat!("page-doc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Simple HTTP client
pub struct HttpClient {
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        HttpClient {
            config: HttpConfig::default(),
        }
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpConfig) -> Self {
        HttpClient { config }
    }

    /// GET a locator, following redirects. Non-2xx final responses are errors.
    pub fn get(&self, locator: &str) -> Result<HttpResponse, FetchError> {
        let mut current = locator.to_string();

        for _ in 0..=self.config.max_redirects {
            let target = Locator::parse(&current)?;
            let response = self.get_with_retries(&target, &current)?;

            if response.is_redirect() {
                if let Some(next) = response.get_header("location") {
                    let next = target.resolve(next);
                    log::debug!("{} redirected to {}", current, next);
                    current = next;
                    continue;
                }
            }

            if !response.is_success() {
                return Err(FetchError::Status {
                    locator: current,
                    status: response.status,
                });
            }
            return Ok(response);
        }

        Err(FetchError::TooManyRedirects {
            locator: locator.to_string(),
            limit: self.config.max_redirects,
        })
    }

    fn get_with_retries(&self, target: &Locator, locator: &str) -> Result<HttpResponse, FetchError> {
        let mut last_error = None;
        let mut delay = self.config.retry_delay_ms;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(delay));
                delay = delay.saturating_mul(2); // Exponential backoff
            }

            let outcome = self.do_get(target, locator).and_then(|response| {
                // Retry on 5xx errors (server errors) and 429 (rate limit)
                if response.status >= 500 || response.status == 429 {
                    Err(FetchError::Status {
                        locator: locator.to_string(),
                        status: response.status,
                    })
                } else {
                    Ok(response)
                }
            });

            match outcome {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    log::debug!(
                        "fetch attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        locator,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Connect {
            locator: locator.to_string(),
            message: "Unknown error".to_string(),
        }))
    }

    fn do_get(&self, target: &Locator, locator: &str) -> Result<HttpResponse, FetchError> {
        match target.scheme {
            Scheme::Http => self.do_get_plain(target, locator),
            Scheme::Https => self.do_get_tls(target, locator),
            Scheme::File => Err(FetchError::InvalidLocator(locator.to_string())),
        }
    }

    fn connect(&self, target: &Locator, locator: &str) -> Result<TcpStream, FetchError> {
        let connect_err = |message: String| FetchError::Connect {
            locator: locator.to_string(),
            message,
        };

        let addr = (target.host.trim_start_matches('[').trim_end_matches(']'), target.port)
            .to_socket_addrs()
            .map_err(|e| connect_err(format!("Resolve failed: {}", e)))?
            .next()
            .ok_or_else(|| connect_err("host resolved to no addresses".to_string()))?;

        let stream = TcpStream::connect_timeout(&addr, Duration::from_millis(self.config.connect_timeout_ms))
            .map_err(|e| connect_err(format!("Connection failed: {}", e)))?;

        // Set timeouts
        stream
            .set_read_timeout(Some(Duration::from_millis(self.config.read_timeout_ms)))
            .ok();
        stream
            .set_write_timeout(Some(Duration::from_millis(self.config.connect_timeout_ms)))
            .ok();

        Ok(stream)
    }

    fn do_get_plain(&self, target: &Locator, locator: &str) -> Result<HttpResponse, FetchError> {
        let mut stream = self.connect(target, locator)?;

        let request = self.build_request(&target.host, &target.path);
        stream
            .write_all(request.as_bytes())
            .map_err(|e| FetchError::Connect {
                locator: locator.to_string(),
                message: format!("Write failed: {}", e),
            })?;

        let buffer = read_to_end(&mut stream, locator)?;
        parse_response(&buffer, locator)
    }

    #[cfg(feature = "tls")]
    fn do_get_tls(&self, target: &Locator, locator: &str) -> Result<HttpResponse, FetchError> {
        use std::sync::Arc;

        let mut tcp_stream = self.connect(target, locator)?;
        let tls_err = |message: String| FetchError::Connect {
            locator: locator.to_string(),
            message,
        };

        // Create TLS connection using rustls
        let root_store = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let server_name = rustls::pki_types::ServerName::try_from(target.host.clone())
            .map_err(|_| tls_err(format!("Invalid server name: {}", target.host)))?;

        let mut conn = rustls::ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| tls_err(format!("TLS setup failed: {}", e)))?;

        let mut tls_stream = rustls::Stream::new(&mut conn, &mut tcp_stream);

        let request = self.build_request(&target.host, &target.path);
        tls_stream
            .write_all(request.as_bytes())
            .map_err(|e| tls_err(format!("TLS write failed: {}", e)))?;

        let buffer = read_to_end(&mut tls_stream, locator)?;
        parse_response(&buffer, locator)
    }

    #[cfg(not(feature = "tls"))]
    fn do_get_tls(&self, _target: &Locator, locator: &str) -> Result<HttpResponse, FetchError> {
        Err(FetchError::TlsUnavailable(locator.to_string()))
    }

    fn build_request(&self, host: &str, path: &str) -> String {
        format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             User-Agent: {}\r\n\
             Accept: text/html,application/xhtml+xml;q=0.9,*/*;q=0.8\r\n\
             Accept-Encoding: identity\r\n\
             Connection: close\r\n\r\n",
            path, host, self.config.user_agent
        )
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpClient {
    fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        let target = Locator::parse(locator)?;
        if target.scheme == Scheme::File {
            return std::fs::read_to_string(&target.path).map_err(|e| FetchError::Io {
                path: target.path.clone(),
                source: e,
            });
        }

        self.get(locator).map(|response| response.body)
    }
}

fn read_to_end<R: Read>(reader: &mut R, locator: &str) -> Result<Vec<u8>, FetchError> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                if buffer.is_empty() {
                    return Err(FetchError::Timeout {
                        locator: locator.to_string(),
                    });
                }
                break;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // TLS peer closed without close_notify
                break;
            }
            Err(e) => {
                return Err(FetchError::Connect {
                    locator: locator.to_string(),
                    message: format!("Read failed: {}", e),
                });
            }
        }
    }

    Ok(buffer)
}

fn parse_response(buffer: &[u8], locator: &str) -> Result<HttpResponse, FetchError> {
    let parse_err = |message: String| FetchError::Parse {
        locator: locator.to_string(),
        message,
    };

    // Find header/body separator
    let header_end = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| parse_err("no header/body separator".to_string()))?;

    let header_section = String::from_utf8_lossy(&buffer[..header_end]);
    let body_bytes = &buffer[header_end + 4..];

    // Parse status line
    let mut lines = header_section.lines();
    let status_line = lines.next().ok_or_else(|| parse_err("empty response".to_string()))?;
    let status = parse_status_line(status_line).ok_or_else(|| parse_err(format!("invalid status line: {}", status_line)))?;

    // Parse headers
    let mut headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let chunked = headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("transfer-encoding") && v.to_lowercase().contains("chunked"));

    let body = if chunked {
        decode_chunked(body_bytes).ok_or_else(|| parse_err("invalid chunked encoding".to_string()))?
    } else {
        body_bytes.to_vec()
    };

    Ok(HttpResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn parse_status_line(line: &str) -> Option<u16> {
    // Format: "HTTP/1.1 200 OK"
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

fn decode_chunked(mut remaining: &[u8]) -> Option<Vec<u8>> {
    let mut result = Vec::new();

    loop {
        // Find chunk size line
        let size_end = remaining.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&remaining[..size_end]).ok()?;
        // Chunk extensions follow a ';'
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let chunk_size = usize::from_str_radix(size_str, 16).ok()?;

        if chunk_size == 0 {
            break;
        }

        let chunk_start = size_end + 2;
        let chunk_end = chunk_start.checked_add(chunk_size)?;

        if chunk_end > remaining.len() {
            // Incomplete chunk, take what we have
            result.extend_from_slice(&remaining[chunk_start..]);
            break;
        }

        result.extend_from_slice(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or(&[]);
    }

    Some(result)
}
