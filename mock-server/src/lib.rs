//! In-memory stand-in for a TaguchiMail v4 API endpoint.
//!
//! Serves `/admin/api/{org}/{resource}/{id?}` with the same `_method`
//! tunnelling and `auth` query parameter as the real service, stores records
//! per resource, and records every request it receives so tests can inspect
//! exactly what went over the wire.

pub mod filter;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

use crate::filter::{sort_by_field, Condition};

pub const DEFAULT_USERNAME: &str = "user@example.com";
pub const DEFAULT_PASSWORD: &str = "secret";

/// Requests kept for inspection; older ones are dropped first.
pub const MAX_RECORDED_REQUESTS: usize = 1024;

/// One request as the server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Raw, still percent-encoded query string.
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded query pairs in wire order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_query(&self.query)
    }
}

#[derive(Debug, Default)]
struct Store {
    records: HashMap<String, BTreeMap<i64, Value>>,
    next_id: i64,
    requests: VecDeque<RecordedRequest>,
}

impl Store {
    fn record(&mut self, request: RecordedRequest) {
        if self.requests.len() == MAX_RECORDED_REQUESTS {
            self.requests.pop_front();
        }
        self.requests.push_back(request);
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared server state; clone it before handing it to `app_with_state` to
/// keep a handle for inspection.
#[derive(Debug, Clone)]
pub struct MockState {
    credentials: String,
    db: Arc<RwLock<Store>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

impl MockState {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            credentials: format!("{username}|{password}"),
            db: Arc::new(RwLock::new(Store::default())),
        }
    }

    /// The most recent requests, oldest first.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.db.read().await.requests.iter().cloned().collect()
    }

    /// Same as `requests`, for callers outside the runtime.
    pub fn blocking_requests(&self) -> Vec<RecordedRequest> {
        self.db.blocking_read().requests.iter().cloned().collect()
    }
}

pub fn app() -> Router {
    app_with_state(MockState::default())
}

pub fn app_with_state(state: MockState) -> Router {
    Router::new()
        .route("/admin/api/{org}/{resource}/", get(dispatch).post(dispatch))
        .route("/admin/api/{org}/{resource}/{id}", get(dispatch).post(dispatch))
        .with_state(state)
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

type Reply = Result<Json<Value>, (StatusCode, String)>;

fn reject(status: StatusCode, message: impl Into<String>) -> (StatusCode, String) {
    (status, message.into())
}

async fn dispatch(
    State(state): State<MockState>,
    method: Method,
    Path(path): Path<HashMap<String, String>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    let query = query.unwrap_or_default();
    let resource = path.get("resource").cloned().unwrap_or_default();
    let id = path.get("id").cloned();

    let mut store = state.db.write().await;
    store.record(RecordedRequest {
        method: method.to_string(),
        path: format!(
            "/admin/api/{}/{}/{}",
            path.get("org").map(String::as_str).unwrap_or_default(),
            resource,
            id.as_deref().unwrap_or_default()
        ),
        query: query.clone(),
        headers: headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: body.clone(),
    });

    let pairs = parse_query(&query);
    let param = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    if param("auth") != Some(state.credentials.as_str()) {
        return reject(StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }
    let Some(command) = param("_method").map(str::to_string) else {
        return reject(StatusCode::BAD_REQUEST, "missing _method").into_response();
    };
    let expected = if command == "GET" { Method::GET } else { Method::POST };
    if method != expected {
        return reject(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("{command} must be sent as {expected}"),
        )
        .into_response();
    }
    let id = match id.map(|raw| raw.parse::<i64>()).transpose() {
        Ok(id) => id,
        Err(_) => return reject(StatusCode::BAD_REQUEST, "record id must be numeric").into_response(),
    };

    debug!(%command, %resource, ?id, "mock request");

    let reply = if command == "GET" {
        let predicates: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "query")
            .map(|(_, v)| v.as_str())
            .collect();
        let with_revisions = param("revisions") == Some("latest");
        match id {
            Some(id) => fetch_one(&store, &resource, id, with_revisions),
            None => fetch_many(&store, &resource, &predicates, &param, with_revisions),
        }
    } else {
        match parse_body(&headers, &body) {
            Err(rejection) => Err(rejection),
            Ok(records) => match command.as_str() {
                "POST" => Ok(create(&mut store, &resource, records)),
                "PUT" => update(&mut store, &resource, id, records),
                "CREATEORUPDATE" => Ok(create_or_update(&mut store, &resource, records)),
                _ => run_command(&store, &resource, id, &command),
            },
        }
    };

    reply.into_response()
}

/// Split a raw query string into decoded pairs, keeping order and repeats.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn parse_body(headers: &HeaderMap, body: &str) -> Result<Vec<Map<String, Value>>, (StatusCode, String)> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return Err(reject(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "body requires Content-Type: application/json",
        ));
    }
    serde_json::from_str(body)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("body must be an array of objects: {e}")))
}

/// Drop revisions unless they were asked for; keep only the latest.
fn present(record: &Value, with_revisions: bool) -> Value {
    let mut record = record.clone();
    if let Some(obj) = record.as_object_mut() {
        match obj.remove("revisions") {
            Some(Value::Array(revs)) if with_revisions => {
                obj.insert("revisions".to_string(), Value::Array(revs.into_iter().take(1).collect()));
            }
            _ => {}
        }
    }
    record
}

fn fetch_one(store: &Store, resource: &str, id: i64, with_revisions: bool) -> Reply {
    store
        .records
        .get(resource)
        .and_then(|table| table.get(&id))
        .map(|record| Json(json!([present(record, with_revisions)])))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, format!("{resource} {id} not found")))
}

fn fetch_many<'a>(
    store: &Store,
    resource: &str,
    predicates: &[&str],
    param: &impl Fn(&str) -> Option<&'a str>,
    with_revisions: bool,
) -> Reply {
    let mut conditions = Vec::with_capacity(predicates.len());
    for raw in predicates {
        let condition = Condition::parse(raw)
            .ok_or_else(|| reject(StatusCode::BAD_REQUEST, format!("malformed predicate: {raw}")))?;
        if !condition.is_supported() {
            return Err(reject(
                StatusCode::BAD_REQUEST,
                format!("unsupported operator: {}", condition.op),
            ));
        }
        conditions.push(condition);
    }

    let mut matched: Vec<Value> = store
        .records
        .get(resource)
        .map(|table| {
            table
                .values()
                .filter(|record| conditions.iter().all(|c| c.matches(record)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    sort_by_field(
        &mut matched,
        param("sort").unwrap_or("id"),
        param("order") == Some("desc"),
    );
    let offset = param("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit = param("limit").and_then(|v| v.parse().ok()).unwrap_or(1);

    let page: Vec<Value> = matched
        .iter()
        .skip(offset)
        .take(limit)
        .map(|record| present(record, with_revisions))
        .collect();
    Ok(Json(Value::Array(page)))
}

/// Give new revisions ids and put them ahead of the stored ones.
fn merge_revisions(store: &mut Store, existing: Option<Value>, incoming: Option<Value>) -> Value {
    let mut revisions: Vec<Value> = match incoming {
        Some(Value::Array(new)) => new
            .into_iter()
            .map(|mut rev| {
                if let Some(obj) = rev.as_object_mut() {
                    obj.insert("id".to_string(), json!(store.allocate_id()));
                }
                rev
            })
            .collect(),
        _ => Vec::new(),
    };
    if let Some(Value::Array(old)) = existing {
        revisions.extend(old);
    }
    Value::Array(revisions)
}

fn insert(store: &mut Store, resource: &str, mut fields: Map<String, Value>) -> Value {
    let id = store.allocate_id();
    fields.insert("id".to_string(), json!(id));
    if let Some(revisions) = fields.remove("revisions") {
        let merged = merge_revisions(store, None, Some(revisions));
        fields.insert("revisions".to_string(), merged);
    }
    let record = Value::Object(fields);
    store
        .records
        .entry(resource.to_string())
        .or_default()
        .insert(id, record.clone());
    record
}

fn merge(store: &mut Store, resource: &str, id: i64, mut fields: Map<String, Value>) -> Option<Value> {
    let mut current = store.records.get(resource)?.get(&id)?.clone();
    let incoming_revisions = fields.remove("revisions");
    fields.remove("id");
    let obj = current.as_object_mut()?;
    let existing_revisions = obj.remove("revisions");
    obj.extend(fields);
    let merged = merge_revisions(store, existing_revisions, incoming_revisions);
    if merged.as_array().is_some_and(|revs| !revs.is_empty()) {
        obj.insert("revisions".to_string(), merged);
    }
    store
        .records
        .entry(resource.to_string())
        .or_default()
        .insert(id, current.clone());
    Some(current)
}

fn create(store: &mut Store, resource: &str, records: Vec<Map<String, Value>>) -> Json<Value> {
    let created: Vec<Value> = records
        .into_iter()
        .map(|fields| insert(store, resource, fields))
        .collect();
    Json(Value::Array(created))
}

fn update(store: &mut Store, resource: &str, id: Option<i64>, records: Vec<Map<String, Value>>) -> Reply {
    let id = id.ok_or_else(|| reject(StatusCode::BAD_REQUEST, "PUT requires a record id"))?;
    let fields = records.into_iter().next().unwrap_or_default();
    merge(store, resource, id, fields)
        .map(|record| Json(json!([record])))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, format!("{resource} {id} not found")))
}

/// Match on id, then ref, then email; insert when nothing matches.
fn create_or_update(store: &mut Store, resource: &str, records: Vec<Map<String, Value>>) -> Json<Value> {
    let mut saved = Vec::with_capacity(records.len());
    for fields in records {
        let existing = ["id", "ref", "email"].iter().find_map(|key| {
            let wanted = fields.get(*key).filter(|v| !v.is_null())?;
            store
                .records
                .get(resource)?
                .iter()
                .find(|(_, record)| record.get(*key) == Some(wanted))
                .map(|(id, _)| *id)
        });
        let record = match existing.and_then(|id| merge(store, resource, id, fields.clone())) {
            Some(record) => record,
            None => insert(store, resource, fields),
        };
        saved.push(record);
    }
    Json(Value::Array(saved))
}

/// Custom commands only need the target record to exist.
fn run_command(store: &Store, resource: &str, id: Option<i64>, command: &str) -> Reply {
    let id = id.ok_or_else(|| reject(StatusCode::BAD_REQUEST, format!("{command} requires a record id")))?;
    let exists = store
        .records
        .get(resource)
        .is_some_and(|table| table.contains_key(&id));
    if !exists {
        return Err(reject(StatusCode::NOT_FOUND, format!("{resource} {id} not found")));
    }
    Ok(Json(json!([{ "id": id, "command": command, "status": "accepted" }])))
}
