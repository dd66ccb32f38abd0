//! Subscriber records, custom fields, and list memberships.
//!
//! Membership changes are staged on the record and sent with the next
//! `create`, `update`, or `create_or_update`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::{Command, Context};
use crate::error::ApiError;
use crate::record::{save, Record};
use crate::types::SubscriberList;

/// A subscriber (one person/address) in the organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "firstname", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastname", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// ISO 8601 date of birth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suburb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Read-only; computed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_rating: Option<i64>,
    /// Read-only; computed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_profile: Option<String>,
    /// Global unsubscribe timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribed: Option<String>,
    /// Bounce timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounced: Option<String>,
    /// Arbitrary XML payload stored with the record.
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub xml_data: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lists: Vec<ListSubscription>,
    /// Fields this client does not model, kept so updates send them back.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub field: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Membership of a subscriber in one list.
///
/// `option` and `unsubscribed` are always serialized: an explicit `null`
/// is how a re-subscription clears them server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSubscription {
    pub list_id: i64,
    #[serde(default)]
    pub option: Option<String>,
    #[serde(default)]
    pub unsubscribed: Option<Unsubscribed>,
}

/// Server sends a timestamp; the client sends `true` to request removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Unsubscribed {
    Flag(bool),
    At(String),
}

impl Subscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custom_field(&self, field: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|cf| cf.field == field)
            .and_then(|cf| cf.data.as_deref())
    }

    pub fn set_custom_field(&mut self, field: &str, data: &str) {
        match self.custom_fields.iter_mut().find(|cf| cf.field == field) {
            Some(cf) => cf.data = Some(data.to_string()),
            None => self.custom_fields.push(CustomField {
                field: field.to_string(),
                data: Some(data.to_string()),
            }),
        }
    }

    fn subscription(&self, list_id: i64) -> Option<&ListSubscription> {
        self.lists.iter().find(|l| l.list_id == list_id)
    }

    pub fn is_subscribed_to_list(&self, list_id: i64) -> bool {
        self.subscription(list_id)
            .is_some_and(|l| l.unsubscribed.is_none())
    }

    /// True only for lists the subscriber was on and has left.
    pub fn is_unsubscribed_from_list(&self, list_id: i64) -> bool {
        self.subscription(list_id)
            .is_some_and(|l| l.unsubscribed.is_some())
    }

    pub fn subscription_option(&self, list_id: i64) -> Option<&str> {
        self.subscription(list_id).and_then(|l| l.option.as_deref())
    }

    pub fn subscribed_list_ids(&self) -> Vec<i64> {
        self.lists
            .iter()
            .filter(|l| l.unsubscribed.is_none())
            .map(|l| l.list_id)
            .collect()
    }

    pub fn unsubscribed_list_ids(&self) -> Vec<i64> {
        self.lists
            .iter()
            .filter(|l| l.unsubscribed.is_some())
            .map(|l| l.list_id)
            .collect()
    }

    /// Fetch every list the subscriber is currently on, one request each.
    pub fn subscribed_lists(&self, ctx: &Context) -> Result<Vec<SubscriberList>, ApiError> {
        fetch_lists(ctx, self.subscribed_list_ids())
    }

    pub fn unsubscribed_lists(&self, ctx: &Context) -> Result<Vec<SubscriberList>, ApiError> {
        fetch_lists(ctx, self.unsubscribed_list_ids())
    }

    /// Add or reactivate a list membership. Takes effect on the next save.
    pub fn subscribe_to_list(&mut self, list_id: i64, option: Option<&str>) {
        let option = option.map(str::to_string);
        match self.lists.iter_mut().find(|l| l.list_id == list_id) {
            Some(l) => {
                l.option = option;
                l.unsubscribed = None;
            }
            None => self.lists.push(ListSubscription {
                list_id,
                option,
                unsubscribed: None,
            }),
        }
    }

    /// Mark a list membership as unsubscribed. Takes effect on the next save.
    pub fn unsubscribe_from_list(&mut self, list_id: i64) {
        match self.lists.iter_mut().find(|l| l.list_id == list_id) {
            Some(l) => {
                if l.unsubscribed.is_none() {
                    l.unsubscribed = Some(Unsubscribed::Flag(true));
                }
            }
            None => self.lists.push(ListSubscription {
                list_id,
                option: None,
                unsubscribed: Some(Unsubscribed::Flag(true)),
            }),
        }
    }

    /// Create the subscriber, or update the existing one the server matches
    /// it to (by id, ref, or email).
    pub fn create_or_update(&mut self, ctx: &Context) -> Result<(), ApiError> {
        save(self, ctx, Command::CreateOrUpdate, None)
    }
}

fn fetch_lists(ctx: &Context, ids: Vec<i64>) -> Result<Vec<SubscriberList>, ApiError> {
    let params = BTreeMap::new();
    ids.into_iter()
        .map(|id| SubscriberList::get(ctx, id, &params))
        .collect()
}

impl Record for Subscriber {
    const RESOURCE: &'static str = "subscriber";

    fn record_id(&self) -> Option<i64> {
        self.id
    }
}
