//! HTTP transport types and the blocking transport that executes them.
//!
//! # Design
//! Requests and responses are plain data. `Context::build_request` produces an
//! `HttpRequest` without touching the network, and a `Transport` turns it into
//! an `HttpResponse`. The default transport is a ureq agent; tests can swap in
//! their own implementation through `Context::with_transport`.
//!
//! All fields use owned types so values can be recorded, compared, and
//! replayed without lifetime concerns.

use std::time::Duration;

use crate::error::BoxError;

/// Fixed per-request timeout applied by [`UreqTransport`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP method for a request.
///
/// The API tunnels every command through `_method`, so only GET and POST ever
/// reach the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// The body stays as raw bytes; UTF-8 decoding is the dispatcher's job so a
/// malformed body surfaces as its own error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one `HttpRequest` and returns whatever the server answered.
///
/// Implementations must not interpret status codes: a 4xx/5xx response is a
/// successful round-trip. Errors are reserved for failures that produced no
/// response at all.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError>;
}

/// Blocking transport backed by a ureq agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        // Status codes are returned as data so the dispatcher can map them.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        // ureq derives Content-Length from the body it sends.
        let headers = request
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("content-length"));

        let mut response = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => {
                let mut builder = self.agent.get(&request.url);
                for (k, v) in headers {
                    builder = builder.header(k.as_str(), v.as_str());
                }
                builder.call()?
            }
            (HttpMethod::Post, body) => {
                let mut builder = self.agent.post(&request.url);
                for (k, v) in headers {
                    builder = builder.header(k.as_str(), v.as_str());
                }
                match body {
                    Some(body) => builder.send(body.as_bytes())?,
                    None => builder.send_empty()?,
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        // ureq caps bodies at 10 MiB by default; large finds go well past that.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
