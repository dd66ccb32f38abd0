//! Synchronous client for the TaguchiMail v4 REST API.
//!
//! # Overview
//! Every operation, from fetching a subscriber to triggering an activity,
//! becomes one `CommandRequest` that `Context` turns into a single HTTP call:
//!
//! ```text
//! {base}/{resource}/{id?}?_method={VERB}&auth={user|pass}[&query=...]*[&key=value]*
//! ```
//!
//! The verb rides in `_method`; the HTTP method is GET for `GET` and POST for
//! everything else. Responses are JSON arrays of records.
//!
//! # Design
//! - `Context` is immutable and shared by reference; there is no global
//!   connection state.
//! - `Context::build_request` is pure, `Context::make_request` executes it
//!   through a pluggable `Transport` (ureq by default).
//! - Resource types in [`types`] are plain serde structs; the [`Record`]
//!   trait supplies get/find/create/update on top of `make_request`.
//!
//! ```no_run
//! use tmapi_core::{Context, FindOptions, Predicate, Record, Subscriber};
//!
//! let ctx = Context::new("mail.example.com", "me@example.com", "secret", "1");
//! let found = Subscriber::find(
//!     &ctx,
//!     &FindOptions::new().limit(1).query(Predicate::eq("email", "me@example.com")),
//! )?;
//! # Ok::<(), tmapi_core::ApiError>(())
//! ```

pub mod context;
pub mod error;
pub mod http;
pub mod query;
pub mod record;
pub mod types;

pub use context::{Command, CommandRequest, Context, USER_AGENT};
pub use error::{ApiError, BoxError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use query::{Operator, Predicate};
pub use record::{FindOptions, Order, Record};
pub use types::{
    Activity, ActivityRevision, Campaign, CustomField, ListSubscription, Revisions, Subscriber,
    SubscriberList, Template, TemplateRevision, Unsubscribed,
};
