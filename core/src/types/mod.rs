//! Typed records for each API resource.
//!
//! # Design
//! Every resource is a serde struct with explicit optional fields named after
//! their meaning, renamed to the wire keys. Fields the client does not model
//! are captured in a flattened `other` map so an update never drops them.

pub mod activity;
pub mod campaign;
pub mod list;
pub mod revision;
pub mod subscriber;
pub mod template;

pub use activity::{Activity, ActivityRevision};
pub use campaign::Campaign;
pub use list::SubscriberList;
pub use revision::Revisions;
pub use subscriber::{CustomField, ListSubscription, Subscriber, Unsubscribed};
pub use template::{Template, TemplateRevision};
