//! Message templates; content is stored as revisions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::ApiError;
use crate::record::Record;
use crate::types::Revisions;

/// One version of a template's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRevision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl TemplateRevision {
    pub fn new(format: &str, content: &str) -> Self {
        Self {
            id: None,
            format: Some(format.to_string()),
            content: Some(content.to_string()),
        }
    }
}

/// A message template. Content lives in revisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub template_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub xml_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub revisions: Revisions<TemplateRevision>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a template including its latest revision content.
    pub fn get_with_content(
        ctx: &Context,
        id: i64,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ApiError> {
        let mut params = params.clone();
        params.insert("revisions".to_string(), "latest".to_string());
        Self::get(ctx, id, &params)
    }

    pub fn latest_revision(&self) -> Option<&TemplateRevision> {
        self.revisions.latest()
    }

    /// Stage new content; it becomes a revision on the next save.
    pub fn set_latest_revision(&mut self, revision: TemplateRevision) {
        self.revisions.set_latest(TemplateRevision { id: None, ..revision });
    }
}

impl Record for Template {
    const RESOURCE: &'static str = "template";

    fn record_id(&self) -> Option<i64> {
        self.id
    }

    fn on_saved(&mut self, submitted: Self) {
        self.revisions.settle(submitted.revisions);
    }
}
