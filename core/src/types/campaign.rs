//! Campaigns (resource `campaign`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::Record;

/// A campaign groups activities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub xml_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Record for Campaign {
    const RESOURCE: &'static str = "campaign";

    fn record_id(&self) -> Option<i64> {
        self.id
    }
}
