//! Generic record operations shared by every resource type.
//!
//! # Design
//! Each resource is a plain serde struct implementing [`Record`]. The trait's
//! provided methods translate get/find/create/update into `CommandRequest`s
//! and go through `Context::make_request`; nothing here talks to the network
//! directly. The server always wraps records in a JSON array, both in request
//! bodies and in responses, so single-record calls take element 0.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::{Command, CommandRequest, Context};
use crate::error::ApiError;

/// Sort direction for [`FindOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorting, paging, and predicates for a `find` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: String,
    pub order: Order,
    pub offset: u32,
    pub limit: u32,
    pub query: Vec<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            sort: "id".to_string(),
            order: Order::Asc,
            offset: 0,
            limit: 100,
            query: Vec::new(),
        }
    }
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort = field.into();
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Add a predicate; accepts raw strings or [`Predicate`](crate::Predicate).
    pub fn query(mut self, predicate: impl Into<String>) -> Self {
        self.query.push(predicate.into());
        self
    }

    fn to_request(&self, resource: &str) -> CommandRequest {
        CommandRequest::new(resource, Command::Get)
            .param("sort", &self.sort)
            .param("order", self.order)
            .param("offset", self.offset)
            .param("limit", self.limit)
            .predicates(self.query.iter().cloned())
    }
}

/// A record stored in one TaguchiMail resource.
pub trait Record: Serialize + DeserializeOwned + Sized {
    /// Resource path segment, e.g. `"subscriber"`.
    const RESOURCE: &'static str;

    fn record_id(&self) -> Option<i64>;

    /// Extra parameters sent with every `find` for this resource.
    fn find_params() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    /// Called after a successful save with the record as it was submitted.
    /// `self` already holds the server's copy.
    fn on_saved(&mut self, _submitted: Self) {}

    /// Fetch one record by id.
    fn get(ctx: &Context, id: i64, params: &BTreeMap<String, String>) -> Result<Self, ApiError> {
        let req = CommandRequest::new(Self::RESOURCE, Command::Get)
            .record_id(id)
            .params(params.clone());
        let text = ctx.make_request(&req)?;
        first(parse_records(&text)?, Self::RESOURCE)
    }

    /// Fetch every record matching `options`.
    fn find(ctx: &Context, options: &FindOptions) -> Result<Vec<Self>, ApiError> {
        let req = options
            .to_request(Self::RESOURCE)
            .params(Self::find_params());
        let text = ctx.make_request(&req)?;
        parse_records(&text)
    }

    /// Create this record on the server and replace it with the stored copy.
    fn create(&mut self, ctx: &Context) -> Result<(), ApiError> {
        save(self, ctx, Command::Post, None)
    }

    /// Save changes to an existing record.
    fn update(&mut self, ctx: &Context) -> Result<(), ApiError> {
        let id = require_id(&*self)?;
        save(self, ctx, Command::Put, Some(id))
    }
}

/// Deserialize a response array.
pub(crate) fn parse_records<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn first<T>(records: Vec<T>, resource: &str) -> Result<T, ApiError> {
    records.into_iter().next().ok_or_else(|| ApiError::EmptyResponse {
        resource: resource.to_string(),
    })
}

/// Wrap one value in the single-element array the server expects.
pub(crate) fn encode_body<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(&[value]).map_err(|e| ApiError::SerializationError(e.to_string()))
}

pub(crate) fn require_id<T: Record>(record: &T) -> Result<i64, ApiError> {
    record.record_id().ok_or_else(|| ApiError::MissingRecordId {
        resource: T::RESOURCE.to_string(),
    })
}

/// Submit `record` with `command` and swap in the server's copy.
pub(crate) fn save<T: Record>(
    record: &mut T,
    ctx: &Context,
    command: Command,
    record_id: Option<i64>,
) -> Result<(), ApiError> {
    let mut req = CommandRequest::new(T::RESOURCE, command).body(encode_body(&*record)?);
    if let Some(id) = record_id {
        req = req.record_id(id);
    }
    let text = ctx.make_request(&req)?;
    let stored = first(parse_records::<T>(&text)?, T::RESOURCE)?;
    let submitted = std::mem::replace(record, stored);
    record.on_saved(submitted);
    Ok(())
}

/// Issue a record-scoped custom command and return the raw response.
pub(crate) fn run_command<T: Record>(
    record: &T,
    ctx: &Context,
    command: Command,
    body: &serde_json::Value,
) -> Result<String, ApiError> {
    let id = require_id(record)?;
    let req = CommandRequest::new(T::RESOURCE, command)
        .record_id(id)
        .body(encode_body(body)?);
    ctx.make_request(&req)
}
