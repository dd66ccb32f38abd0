//! Walks through the common client workflows against a live account:
//! look up and edit a subscriber, toggle a list membership, bulk-create
//! subscribers, dump every list, and trigger an activity.

use std::collections::BTreeMap;
use std::env;

use anyhow::{anyhow, Context as _, Result};
use rand::Rng;
use tmapi_core::{Activity, Context, FindOptions, Predicate, Record, Subscriber, SubscriberList};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CREATE_COUNT: usize = 100;

const PURCHASE: &str = "<purchase>
  <product href='http://example.com/1234'>
    <name>Example Product</name>
    <price>123.45</price>
    <sku>XYZ1234ABC</sku>
  </product>
  <transaction>
    <name>Ms Example User</name>
    <phone>03 9123 4567</phone>
    <date>Monday, 22 November 2010</date>
    <time>6:30 PM</time>
    <confirmation-number>ABC123</confirmation-number>
  </transaction>
</purchase>";

struct Config {
    host: String,
    username: String,
    password: String,
    organization_id: String,
    list_id: i64,
    activity_id: i64,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: required("TMAPI_HOST")?,
            username: required("TMAPI_USERNAME")?,
            password: required("TMAPI_PASSWORD")?,
            organization_id: required("TMAPI_ORGANIZATION_ID")?,
            list_id: optional_id("TMAPI_LIST_ID", 123)?,
            activity_id: optional_id("TMAPI_ACTIVITY_ID", 123)?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional_id(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("{key} must be an integer")),
        Err(_) => Ok(default),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(host = %config.host, organization_id = %config.organization_id, "connecting");
    let ctx = Context::new(
        &config.host,
        &config.username,
        &config.password,
        &config.organization_id,
    );

    let mut subscriber = edit_subscriber(&ctx, &config)?;
    toggle_membership(&ctx, &mut subscriber, config.list_id)?;
    create_subscribers(&ctx, config.list_id)?;
    dump_lists(&ctx)?;

    let activity = Activity::get(&ctx, config.activity_id, &BTreeMap::new())
        .with_context(|| format!("loading activity {}", config.activity_id))?;
    info!(
        activity = activity.name.as_deref().unwrap_or_default(),
        email = subscriber.email.as_deref().unwrap_or_default(),
        "triggering activity"
    );
    activity.trigger_subscribers(&ctx, std::slice::from_ref(&subscriber), PURCHASE, false)?;
    info!("sent");
    Ok(())
}

/// Find the account's own subscriber record and append to its last name.
fn edit_subscriber(ctx: &Context, config: &Config) -> Result<Subscriber> {
    let options = FindOptions::new()
        .limit(1)
        .query(Predicate::eq("email", &config.username));
    let mut subscriber = Subscriber::find(ctx, &options)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no subscriber with email {}", config.username))?;
    info!(
        id = ?subscriber.id,
        first_name = subscriber.first_name.as_deref().unwrap_or_default(),
        last_name = subscriber.last_name.as_deref().unwrap_or_default(),
        "found subscriber"
    );

    let last_name = format!("{}Lorem", subscriber.last_name.as_deref().unwrap_or_default());
    subscriber.last_name = Some(last_name);
    subscriber.update(ctx)?;
    info!(id = ?subscriber.id, last_name = ?subscriber.last_name, "updated last name");
    Ok(subscriber)
}

fn toggle_membership(ctx: &Context, subscriber: &mut Subscriber, list_id: i64) -> Result<()> {
    if subscriber.is_subscribed_to_list(list_id) {
        info!(list_id, "unsubscribing");
        subscriber.unsubscribe_from_list(list_id);
    } else {
        info!(list_id, "subscribing");
        subscriber.subscribe_to_list(list_id, Some("example"));
    }
    subscriber.update(ctx)?;

    let lists = subscriber.subscribed_lists(ctx)?;
    info!(id = ?subscriber.id, count = lists.len(), "subscribed lists");
    Ok(())
}

/// Create or merge test subscribers, split across two adjacent lists.
fn create_subscribers(ctx: &Context, list_id: i64) -> Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..CREATE_COUNT {
        let idx: u32 = rng.gen_range(0..1000);
        let mut subscriber = Subscriber::new();
        subscriber.first_name = Some(format!("Subscriber{idx}"));
        subscriber.last_name = Some("Test".to_string());
        subscriber.email = Some(format!("edmtest+{idx}@mail.taguchimail.com"));
        let target = if idx % 2 == 0 { list_id } else { list_id + 1 };
        subscriber.subscribe_to_list(target, None);
        subscriber.create_or_update(ctx)?;
        info!(email = ?subscriber.email, id = ?subscriber.id, "created subscriber");
    }
    Ok(())
}

fn dump_lists(ctx: &Context) -> Result<()> {
    for list in SubscriberList::find(ctx, &FindOptions::new())? {
        let Some(list_id) = list.id else { continue };
        info!(list_id, name = list.name.as_deref().unwrap_or_default(), "dumping list");
        for subscriber in list.subscribers(ctx, 0, 1000)? {
            let state = if subscriber.is_subscribed_to_list(list_id) {
                "subscribed"
            } else {
                "unsubscribed"
            };
            info!(email = ?subscriber.email, id = ?subscriber.id, state, "  member");
        }
    }
    Ok(())
}
