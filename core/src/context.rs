//! Connection context and the single request path every operation uses.
//!
//! # Design
//! `Context` holds the connection descriptor (base URL and credentials) plus a
//! shared `Transport`. It carries no mutable state, so one context can serve
//! any number of threads. Every API operation is expressed as a
//! `CommandRequest`; `build_request` turns it into an `HttpRequest` without
//! I/O and `make_request` executes it and returns the response text.
//!
//! Credentials travel in the `auth` query parameter on every request. That is
//! how the server expects them; nothing here tries to move them to a header.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("TMAPIv4 Rust wrapper/", env!("CARGO_PKG_VERSION"));

/// Command verb tunnelled through the `_method` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Put,
    Post,
    CreateOrUpdate,
    Trigger,
    Queue,
    Approve,
    Proof,
    Approval,
    Custom(String),
}

impl Command {
    /// The literal token sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Command::Get => "GET",
            Command::Put => "PUT",
            Command::Post => "POST",
            Command::CreateOrUpdate => "CREATEORUPDATE",
            Command::Trigger => "TRIGGER",
            Command::Queue => "QUEUE",
            Command::Approve => "APPROVE",
            Command::Proof => "PROOF",
            Command::Approval => "APPROVAL",
            Command::Custom(token) => token,
        }
    }

    /// GET only for the literal `GET` token; everything else is POSTed.
    pub fn http_method(&self) -> HttpMethod {
        if self.as_str() == "GET" {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        }
    }
}

impl From<&str> for Command {
    fn from(token: &str) -> Self {
        match token {
            "GET" => Command::Get,
            "PUT" => Command::Put,
            "POST" => Command::Post,
            "CREATEORUPDATE" => Command::CreateOrUpdate,
            "TRIGGER" => Command::Trigger,
            "QUEUE" => Command::Queue,
            "APPROVE" => Command::Approve,
            "PROOF" => Command::Proof,
            "APPROVAL" => Command::Approval,
            other => Command::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One command against one resource, built per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub resource: String,
    pub command: Command,
    pub record_id: Option<String>,
    pub body: Option<String>,
    pub params: BTreeMap<String, String>,
    pub predicates: Vec<String>,
}

impl CommandRequest {
    pub fn new(resource: impl Into<String>, command: Command) -> Self {
        Self {
            resource: resource.into(),
            command,
            record_id: None,
            body: None,
            params: BTreeMap::new(),
            predicates: Vec::new(),
        }
    }

    pub fn record_id(mut self, id: impl ToString) -> Self {
        self.record_id = Some(id.to_string());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn predicates<I, P>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.predicates.extend(predicates.into_iter().map(Into::into));
        self
    }
}

/// A TaguchiMail connection: base URL, credentials, and transport.
#[derive(Clone)]
pub struct Context {
    base_url: String,
    username: String,
    password: String,
    organization_id: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Context {
    /// Connect to `https://{host}/admin/api/{organization_id}`.
    pub fn new(host: &str, username: &str, password: &str, organization_id: &str) -> Self {
        let mut ctx = Self::with_base_url(
            &format!("https://{host}/admin/api/{organization_id}"),
            username,
            password,
        );
        ctx.organization_id = Some(organization_id.to_string());
        ctx
    }

    /// Use an explicit base URL, e.g. a local stub server.
    pub fn with_base_url(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            organization_id: None,
            transport: Arc::new(UreqTransport::new()),
        }
    }

    /// Replace the transport used by `make_request`.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// Build the HTTP request for `req` without executing it.
    ///
    /// Query order is fixed: `_method`, `auth`, each `query` predicate in
    /// input order, then the extra parameters. Parameter values are appended
    /// verbatim; only their keys are escaped.
    pub fn build_request(&self, req: &CommandRequest) -> HttpRequest {
        let mut url = format!("{}/{}/", self.base_url, req.resource);
        if let Some(id) = &req.record_id {
            url.push_str(id);
        }
        url.push_str("?_method=");
        url.push_str(&urlencoding::encode(req.command.as_str()));
        url.push_str("&auth=");
        url.push_str(&urlencoding::encode(&format!(
            "{}|{}",
            self.username, self.password
        )));
        for predicate in &req.predicates {
            url.push_str("&query=");
            url.push_str(&urlencoding::encode(predicate));
        }
        for (key, value) in &req.params {
            url.push('&');
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(value);
        }

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        let body = req.body.clone().filter(|b| !b.is_empty());
        if let Some(body) = &body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
            headers.push(("Content-Length".to_string(), body.len().to_string()));
        }

        HttpRequest {
            method: req.command.http_method(),
            url,
            headers,
            body,
        }
    }

    /// Issue `req` and return the response body as text.
    ///
    /// A `GET` cannot carry a body, so one supplied with it is rejected
    /// before anything is sent.
    pub fn make_request(&self, req: &CommandRequest) -> Result<String, ApiError> {
        let http = self.build_request(req);
        if http.method == HttpMethod::Get && http.body.is_some() {
            return Err(ApiError::BodyNotAllowed {
                resource: req.resource.clone(),
                command: req.command.to_string(),
            });
        }
        debug!(
            resource = %req.resource,
            command = %req.command,
            method = http.method.as_str(),
            record_id = req.record_id.as_deref().unwrap_or(""),
            predicates = req.predicates.len(),
            "dispatching request"
        );

        let response = self
            .transport
            .execute(&http)
            .map_err(|source| ApiError::Transport {
                resource: req.resource.clone(),
                command: req.command.to_string(),
                source,
            })?;

        check_status(&response).inspect_err(|err| {
            warn!(resource = %req.resource, command = %req.command, "request failed: {err}");
        })?;
        Ok(String::from_utf8(response.body)?)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("organization_id", &self.organization_id)
            .finish_non_exhaustive()
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound {
            body: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}
