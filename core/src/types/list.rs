//! Subscriber lists and list-side membership helpers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::ApiError;
use crate::query::Predicate;
use crate::record::{require_id, FindOptions, Record};
use crate::types::Subscriber;

/// A subscriber list (resource `list`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriberList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<String>,
    /// Read-only creation timestamp.
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub xml_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `subscriber` onto this list; save the subscriber to apply it.
    pub fn subscribe(&self, subscriber: &mut Subscriber, option: Option<&str>) -> Result<(), ApiError> {
        subscriber.subscribe_to_list(require_id(self)?, option);
        Ok(())
    }

    /// Stage removal of `subscriber` from this list.
    pub fn unsubscribe(&self, subscriber: &mut Subscriber) -> Result<(), ApiError> {
        subscriber.unsubscribe_from_list(require_id(self)?);
        Ok(())
    }

    /// Subscribers with any membership record on this list, ordered by id.
    pub fn subscribers(&self, ctx: &Context, offset: u32, limit: u32) -> Result<Vec<Subscriber>, ApiError> {
        let id = require_id(self)?;
        let options = FindOptions::new()
            .offset(offset)
            .limit(limit)
            .query(Predicate::eq("list_id", id));
        Subscriber::find(ctx, &options)
    }
}

impl Record for SubscriberList {
    const RESOURCE: &'static str = "list";

    fn record_id(&self) -> Option<i64> {
        self.id
    }
}
