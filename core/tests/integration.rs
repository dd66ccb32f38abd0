//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts its own mock server on a random port and talks to it over
//! real HTTP through the default ureq transport. The server records every
//! request, so tests check both the decoded results and the exact wire form
//! the client produced.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::net::SocketAddr;

use mock_server::{MockState, RecordedRequest};
use serde_json::{json, Value};
use tmapi_core::{
    Activity, ActivityRevision, ApiError, Campaign, Command, CommandRequest, Context, FindOptions,
    Operator, Order, Predicate, Record, Subscriber, SubscriberList, Template, TemplateRevision,
    USER_AGENT,
};

const USERNAME: &str = "user@example.com";
const PASSWORD: &str = "secret";
const AUTH: &str = "auth=user%40example.com%7Csecret";

/// Start a mock server on a random port in a background thread.
fn start_server(state: MockState) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_state(listener, state).await
        })
        .unwrap();
    });

    addr
}

fn setup() -> (Context, MockState) {
    let state = MockState::new(USERNAME, PASSWORD);
    let addr = start_server(state.clone());
    let ctx = Context::with_base_url(&format!("http://{addr}/admin/api/1"), USERNAME, PASSWORD);
    (ctx, state)
}

fn last_request(state: &MockState) -> RecordedRequest {
    state.blocking_requests().pop().unwrap()
}

fn no_params() -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn named_list(ctx: &Context, name: &str) -> SubscriberList {
    let mut list = SubscriberList::new();
    list.name = Some(name.to_string());
    list.create(ctx).unwrap();
    list
}

#[test]
fn get_by_id_returns_body_verbatim() {
    let (ctx, state) = setup();
    named_list(&ctx, "A");

    let body = ctx
        .make_request(&CommandRequest::new("list", Command::Get).record_id(1))
        .unwrap();
    assert_eq!(body, r#"[{"id":1,"name":"A"}]"#);

    let recorded = last_request(&state);
    assert_eq!(recorded.method, "GET");
    assert_eq!(recorded.path, "/admin/api/1/list/1");
    assert_eq!(recorded.query, format!("_method=GET&{AUTH}"));
    assert_eq!(recorded.header("accept"), Some("application/json"));
    assert_eq!(recorded.header("user-agent"), Some(USER_AGENT));
    assert!(recorded.header("content-type").is_none());
    assert!(recorded.body.is_empty());
}

#[test]
fn create_or_update_posts_json_body() {
    let (ctx, state) = setup();
    let payload = r#"[{"email":"a@b.com"}]"#;

    let body = ctx
        .make_request(&CommandRequest::new("subscriber", Command::CreateOrUpdate).body(payload))
        .unwrap();
    assert_eq!(body, r#"[{"email":"a@b.com","id":1}]"#);

    let recorded = last_request(&state);
    assert_eq!(recorded.method, "POST");
    assert_eq!(recorded.path, "/admin/api/1/subscriber/");
    assert_eq!(recorded.query, format!("_method=CREATEORUPDATE&{AUTH}"));
    assert_eq!(recorded.header("content-type"), Some("application/json"));
    assert_eq!(
        recorded.header("content-length"),
        Some(payload.len().to_string().as_str())
    );
    assert_eq!(recorded.body, payload);
}

#[test]
fn find_sends_predicates_before_parameters() {
    let (ctx, state) = setup();
    for name in ["Gamma", "Alpha", "Beta"] {
        named_list(&ctx, name);
    }

    let options = FindOptions::new()
        .sort("name")
        .order(Order::Desc)
        .limit(2)
        .query(Predicate::new("id", Operator::Gte, 1))
        .query(Predicate::not_null("name"));
    let found = SubscriberList::find(&ctx, &options).unwrap();
    let names: Vec<&str> = found.iter().filter_map(|l| l.name.as_deref()).collect();
    assert_eq!(names, vec!["Gamma", "Beta"]);

    let recorded = last_request(&state);
    assert_eq!(
        recorded.query,
        format!("_method=GET&{AUTH}&query=id-gte-1&query=name-nt-null&limit=2&offset=0&order=desc&sort=name")
    );
}

#[test]
fn missing_record_is_not_found() {
    let (ctx, _state) = setup();
    let err = Subscriber::get(&ctx, 42, &no_params()).unwrap_err();
    assert_eq!(err.status(), Some(404));
    match err {
        ApiError::NotFound { body } => assert_eq!(body, "subscriber 42 not found"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn wrong_password_is_http_error() {
    let state = MockState::new(USERNAME, PASSWORD);
    let addr = start_server(state);
    let ctx = Context::with_base_url(&format!("http://{addr}/admin/api/1"), USERNAME, "nope");

    let err = SubscriberList::find(&ctx, &FindOptions::new()).unwrap_err();
    match err {
        ApiError::HttpError { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid credentials");
        }
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[test]
fn unsupported_operator_is_rejected_by_server() {
    let (ctx, _state) = setup();
    let options = FindOptions::new().query(Predicate::new("email", Operator::Re, "^a"));
    let err = Subscriber::find(&ctx, &options).unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[test]
fn get_with_body_is_rejected_without_a_request() {
    let (ctx, state) = setup();
    let err = ctx
        .make_request(&CommandRequest::new("list", Command::Get).body(r#"[{"x":1}]"#))
        .unwrap_err();
    assert!(matches!(err, ApiError::BodyNotAllowed { .. }));
    assert!(state.blocking_requests().is_empty());
}

#[test]
fn response_over_ten_mebibytes_is_read_whole() {
    let record = r#"{"id":1,"email":"someone@example.com"}"#;
    let payload = format!("[{}]", vec![record; 300_000].join(","));
    assert!(payload.len() > 11 * 1024 * 1024);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let served = payload.clone();
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            served.len()
        )
        .unwrap();
        stream.write_all(served.as_bytes()).unwrap();
        stream.flush().unwrap();
    });

    let ctx = Context::with_base_url(&format!("http://{addr}/admin/api/1"), USERNAME, PASSWORD);
    let body = ctx
        .make_request(&CommandRequest::new("subscriber", Command::Get))
        .unwrap();
    assert_eq!(body.len(), payload.len());
    assert!(body == payload);
}

#[test]
fn closed_port_is_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let ctx = Context::with_base_url(&format!("http://{addr}/admin/api/1"), USERNAME, PASSWORD);

    let err = ctx
        .make_request(&CommandRequest::new("subscriber", Command::Get))
        .unwrap_err();
    match &err {
        ApiError::Transport {
            resource, command, ..
        } => {
            assert_eq!(resource, "subscriber");
            assert_eq!(command, "GET");
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn subscriber_lifecycle() {
    let (ctx, _state) = setup();
    let list = named_list(&ctx, "Newsletter");
    let list_id = list.id.unwrap();

    // create with a list membership
    let mut sub = Subscriber::new();
    sub.email = Some("ann@example.com".to_string());
    sub.first_name = Some("Ann".to_string());
    sub.set_custom_field("shoe", "9");
    list.subscribe(&mut sub, Some("weekly")).unwrap();
    sub.create(&ctx).unwrap();
    let sub_id = sub.id.unwrap();
    assert!(sub.is_subscribed_to_list(list_id));
    assert_eq!(sub.subscription_option(list_id), Some("weekly"));

    // find by email
    let options = FindOptions::new().query(Predicate::eq("email", "ann@example.com"));
    let mut found = Subscriber::find(&ctx, &options).unwrap();
    assert_eq!(found.len(), 1);
    let mut sub = found.remove(0);
    assert_eq!(sub.id, Some(sub_id));
    assert_eq!(sub.custom_field("shoe"), Some("9"));

    // update and leave the list
    sub.last_name = Some("Smith".to_string());
    list.unsubscribe(&mut sub).unwrap();
    sub.update(&ctx).unwrap();

    let reloaded = Subscriber::get(&ctx, sub_id, &no_params()).unwrap();
    assert_eq!(reloaded.last_name.as_deref(), Some("Smith"));
    assert!(reloaded.is_unsubscribed_from_list(list_id));
    assert!(reloaded.subscribed_lists(&ctx).unwrap().is_empty());
    let left = reloaded.unsubscribed_lists(&ctx).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name.as_deref(), Some("Newsletter"));

    // membership records stay visible from the list side
    let members = list.subscribers(&ctx, 0, 10).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, Some(sub_id));
}

#[test]
fn create_or_update_merges_by_email() {
    let (ctx, _state) = setup();

    let mut first = Subscriber::new();
    first.email = Some("bob@example.com".to_string());
    first.first_name = Some("Bob".to_string());
    first.create_or_update(&ctx).unwrap();

    let mut second = Subscriber::new();
    second.email = Some("bob@example.com".to_string());
    second.phone = Some("555".to_string());
    second.create_or_update(&ctx).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.first_name.as_deref(), Some("Bob"));
    assert_eq!(second.phone.as_deref(), Some("555"));
}

#[test]
fn update_without_id_is_rejected_locally() {
    let (ctx, state) = setup();
    let mut sub = Subscriber::new();
    let err = sub.update(&ctx).unwrap_err();
    assert!(matches!(err, ApiError::MissingRecordId { ref resource } if resource == "subscriber"));
    assert!(state.blocking_requests().is_empty());
}

#[test]
fn template_revisions_round_trip() {
    let (ctx, state) = setup();

    let mut template = Template::new();
    template.name = Some("Base".to_string());
    template.set_latest_revision(TemplateRevision::new("html", "<p>v1</p>"));
    template.create(&ctx).unwrap();
    assert!(!template.revisions.is_unsaved());
    let first = template.latest_revision().unwrap().clone();
    assert!(first.id.is_some());
    assert_eq!(first.content.as_deref(), Some("<p>v1</p>"));

    template.set_latest_revision(TemplateRevision::new("html", "<p>v2</p>"));
    template.update(&ctx).unwrap();
    let sent: Value = serde_json::from_str(&last_request(&state).body).unwrap();
    assert_eq!(
        sent[0]["revisions"],
        json!([{"format": "html", "content": "<p>v2</p>"}])
    );

    let id = template.id.unwrap();
    let plain = Template::get(&ctx, id, &no_params()).unwrap();
    assert!(plain.latest_revision().is_none());

    let loaded = Template::get_with_content(&ctx, id, &no_params()).unwrap();
    assert_eq!(
        loaded.latest_revision().and_then(|r| r.content.as_deref()),
        Some("<p>v2</p>")
    );
    assert_eq!(last_request(&state).query, format!("_method=GET&{AUTH}&revisions=latest"));
}

#[test]
fn activity_workflow_commands() {
    let (ctx, state) = setup();

    let mut sub = Subscriber::new();
    sub.email = Some("t@example.com".to_string());
    sub.create(&ctx).unwrap();

    let mut activity = Activity::new();
    activity.name = Some("Welcome".to_string());
    activity.target_expression = Some("list_id=1".to_string());
    activity.set_latest_revision(ActivityRevision::new("<p>hello</p>"));
    activity.create(&ctx).unwrap();
    let id = activity.id.unwrap();

    let found = Activity::find(&ctx, &FindOptions::new().query(Predicate::eq("id", id))).unwrap();
    assert_eq!(found.len(), 1);
    assert!(last_request(&state).query.ends_with("&revisions=latest&sort=id"));
    assert_eq!(
        found[0].latest_revision().and_then(|r| r.content.as_deref()),
        Some("<p>hello</p>")
    );

    let response = activity
        .trigger_subscribers(&ctx, std::slice::from_ref(&sub), "<order/>", true)
        .unwrap();
    let response: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response[0]["command"], "TRIGGER");

    let recorded = last_request(&state);
    assert_eq!(recorded.method, "POST");
    assert_eq!(recorded.path, format!("/admin/api/1/activity/{id}"));
    assert!(recorded.query.starts_with("_method=TRIGGER&"));
    let sent: Value = serde_json::from_str(&recorded.body).unwrap();
    assert_eq!(
        sent,
        json!([{
            "id": id.to_string(),
            "test": 1,
            "request_content": "<order/>",
            "conditions": [sub.id.unwrap().to_string()],
        }])
    );

    activity
        .trigger_expression(&ctx, "email LIKE '%@example.com'", "", false)
        .unwrap();
    activity.proof(&ctx, 1, "[PROOF]", "check it").unwrap();
    activity.request_approval(&ctx, 1, "[APPROVAL]", "sign off").unwrap();
    activity.approve(&ctx).unwrap();
    activity.queue(&ctx, 500).unwrap();

    let verbs: Vec<String> = state
        .blocking_requests()
        .iter()
        .rev()
        .take(5)
        .map(|r| r.query_pairs()[0].1.clone())
        .collect();
    assert_eq!(verbs, vec!["QUEUE", "APPROVE", "APPROVAL", "PROOF", "TRIGGER"]);
}

#[test]
fn command_on_unknown_activity_is_not_found() {
    let (ctx, _state) = setup();
    let mut activity = Activity::new();
    activity.id = Some(999);
    let err = activity.queue(&ctx, 0).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
}

#[test]
fn campaign_date_uses_wire_name() {
    let (ctx, state) = setup();
    let mut campaign = Campaign::default();
    campaign.name = Some("Spring".to_string());
    campaign.start_date = Some("2011-03-01 00:00:00".to_string());
    campaign.create(&ctx).unwrap();

    let sent: Value = serde_json::from_str(&last_request(&state).body).unwrap();
    assert_eq!(sent, json!([{"name": "Spring", "date": "2011-03-01 00:00:00"}]));

    let loaded = Campaign::get(&ctx, campaign.id.unwrap(), &no_params()).unwrap();
    assert_eq!(loaded.start_date.as_deref(), Some("2011-03-01 00:00:00"));
}
