//! Activities: deliverable messages and their proof, approval, queue and
//! trigger commands.

use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::context::{Command, Context};
use crate::error::ApiError;
use crate::record::{require_id, run_command, Record};
use crate::types::{Revisions, Subscriber};

/// One version of an activity's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRevision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
}

impl ActivityRevision {
    pub fn new(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }
}

/// A deliverable message (email, SMS, ...) and its send workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    pub deploy_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "id_from_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub template_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "id_from_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub campaign_id: Option<i64>,
    /// Messages per minute when queued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<i64>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub xml_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub revisions: Revisions<ActivityRevision>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an activity including its latest revision content.
    pub fn get_with_content(
        ctx: &Context,
        id: i64,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, ApiError> {
        let mut params = params.clone();
        params.insert("revisions".to_string(), "latest".to_string());
        Self::get(ctx, id, &params)
    }

    pub fn latest_revision(&self) -> Option<&ActivityRevision> {
        self.revisions.latest()
    }

    /// Stage new content; only the content is submitted on the next save.
    pub fn set_latest_revision(&mut self, revision: ActivityRevision) {
        self.revisions.set_latest(ActivityRevision {
            id: None,
            content: revision.content,
            approval_status: None,
        });
    }

    /// Send a proof of the latest revision to the members of a list.
    pub fn proof(&self, ctx: &Context, list_id: i64, tag: &str, message: &str) -> Result<String, ApiError> {
        let body = self.review_body(list_id, tag, message)?;
        run_command(self, ctx, Command::Proof, &body)
    }

    /// Send an approval request to the members of a list.
    pub fn request_approval(
        &self,
        ctx: &Context,
        list_id: i64,
        tag: &str,
        message: &str,
    ) -> Result<String, ApiError> {
        let body = self.review_body(list_id, tag, message)?;
        run_command(self, ctx, Command::Approval, &body)
    }

    /// Approve the latest revision for deployment with the current target
    /// expression and deploy date.
    ///
    /// Fails locally when no saved revision is loaded; fetch with
    /// `get_with_content` or `find` first.
    pub fn approve(&self, ctx: &Context) -> Result<String, ApiError> {
        let body = self.approve_body()?;
        run_command(self, ctx, Command::Approve, &body)
    }

    fn approve_body(&self) -> Result<Value, ApiError> {
        let revision_id = self
            .latest_revision()
            .and_then(|r| r.id)
            .ok_or_else(|| ApiError::MissingRevisionId {
                resource: Self::RESOURCE.to_string(),
            })?;
        Ok(json!({
            "revision.id": revision_id,
            "target_expression": self.target_expression,
            "date": self.deploy_date,
        }))
    }

    /// Queue the approved activity for broadcast at `throttle` messages per
    /// minute.
    pub fn queue(&self, ctx: &Context, throttle: i64) -> Result<String, ApiError> {
        let body = json!({
            "throttle": throttle,
            "method": "queue",
        });
        run_command(self, ctx, Command::Queue, &body)
    }

    /// Trigger a send to specific subscriber ids. `request_content` is
    /// merged into the message (usually an XML fragment). A test send goes
    /// only to the test list.
    pub fn trigger(
        &self,
        ctx: &Context,
        subscriber_ids: &[i64],
        request_content: &str,
        test: bool,
    ) -> Result<String, ApiError> {
        let conditions: Vec<String> = subscriber_ids.iter().map(i64::to_string).collect();
        let body = self.trigger_body(json!(conditions), request_content, test)?;
        run_command(self, ctx, Command::Trigger, &body)
    }

    /// Trigger a send to already-fetched subscribers. Unsaved subscribers
    /// are rejected.
    pub fn trigger_subscribers(
        &self,
        ctx: &Context,
        subscribers: &[Subscriber],
        request_content: &str,
        test: bool,
    ) -> Result<String, ApiError> {
        let ids = subscribers
            .iter()
            .map(require_id::<Subscriber>)
            .collect::<Result<Vec<_>, _>>()?;
        self.trigger(ctx, &ids, request_content, test)
    }

    /// Trigger a send to every subscriber matching a target expression.
    pub fn trigger_expression(
        &self,
        ctx: &Context,
        expression: &str,
        request_content: &str,
        test: bool,
    ) -> Result<String, ApiError> {
        let body = self.trigger_body(json!({ "expression": expression }), request_content, test)?;
        run_command(self, ctx, Command::Trigger, &body)
    }

    fn review_body(&self, list_id: i64, tag: &str, message: &str) -> Result<Value, ApiError> {
        let id = require_id(self)?;
        Ok(json!({
            "id": id.to_string(),
            "list_id": list_id.to_string(),
            "tag": tag,
            "message": message,
        }))
    }

    fn trigger_body(&self, conditions: Value, request_content: &str, test: bool) -> Result<Value, ApiError> {
        let id = require_id(self)?;
        Ok(json!({
            "id": id.to_string(),
            "test": u8::from(test),
            "request_content": request_content,
            "conditions": conditions,
        }))
    }
}

/// Related-record ids arrive either as numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Number(i64),
    Text(String),
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LooseId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LooseId::Number(id)) => Ok(Some(id)),
        Some(LooseId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(LooseId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid id: {text:?}"))),
    }
}

impl Record for Activity {
    const RESOURCE: &'static str = "activity";

    fn record_id(&self) -> Option<i64> {
        self.id
    }

    fn find_params() -> Vec<(&'static str, &'static str)> {
        vec![("revisions", "latest")]
    }

    fn on_saved(&mut self, submitted: Self) {
        self.revisions.settle(submitted.revisions);
    }
}
