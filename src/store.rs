//! Entity store client: an in-memory document store with live queries.
//!
//! Collections hold JSON documents keyed by generated id. The write path
//! resolves merge sentinels (`server_timestamp`, `array_union`,
//! `array_remove`) before a document lands, so readers only ever see
//! concrete values. Consistency is per-document last-write-wins; there are
//! no cross-document transactions.
//!
//! Live queries re-deliver the *full* current matching set on every change
//! to the collection. Consumers must treat each delivery as an authoritative
//! replacement, never as a diff. A subscription stops delivering as soon as
//! it is cancelled or dropped.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

const SERVER_TIMESTAMP_KEY: &str = "__serverTimestamp";
const ARRAY_UNION_KEY: &str = "__arrayUnion";
const ARRAY_REMOVE_KEY: &str = "__arrayRemove";

/// A stored document: its generated id plus the JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

/// Filter for queries and live queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the collection.
    All,
    /// Documents whose top-level field equals the given value.
    FieldEquals(String, Value),
}

impl Filter {
    /// Filter on a field equalling a string value.
    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::FieldEquals(field.into(), Value::String(value.into()))
    }

    fn matches(&self, fields: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::FieldEquals(field, expected) => fields.get(field) == Some(expected),
        }
    }
}

struct Subscriber {
    id: u64,
    collection: String,
    filter: Filter,
    sender: mpsc::UnboundedSender<Vec<Document>>,
}

#[derive(Default)]
struct StoreInner {
    collections: HashMap<String, BTreeMap<String, Value>>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    offline: bool,
}

impl StoreInner {
    fn ensure_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::Offline);
        }
        Ok(())
    }

    fn snapshot(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.matches(fields))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn broadcast(&mut self, collection: &str) {
        let mut closed = Vec::new();
        let snapshots: Vec<(usize, Vec<Document>)> = self
            .subscribers
            .iter()
            .enumerate()
            .filter(|(_, sub)| sub.collection == collection)
            .map(|(index, sub)| (index, self.snapshot(collection, &sub.filter)))
            .collect();
        for (index, snapshot) in snapshots {
            let sub = &self.subscribers[index];
            if sub.sender.send(snapshot).is_err() {
                closed.push(sub.id);
            }
        }
        if !closed.is_empty() {
            tracing::debug!(count = closed.len(), "pruning closed subscribers");
            self.subscribers.retain(|sub| !closed.contains(&sub.id));
        }
    }
}

/// Handle to the shared in-memory store. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate loss of connectivity: while offline, every call fails
    /// with [`Error::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Placeholder resolved to the current time when the write lands.
    pub fn server_timestamp() -> Value {
        json!({ SERVER_TIMESTAMP_KEY: true })
    }

    /// Merge sentinel: append values not already present in the array field.
    pub fn array_union(values: Vec<Value>) -> Value {
        json!({ ARRAY_UNION_KEY: values })
    }

    /// Merge sentinel: remove matching values from the array field.
    pub fn array_remove(values: Vec<Value>) -> Value {
        json!({ ARRAY_REMOVE_KEY: values })
    }

    /// Add a document with a generated id. Returns the new id.
    pub async fn create(&self, collection: &str, fields: Value) -> Result<String> {
        let id = Ulid::new().to_string().to_lowercase();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }

    /// Write a document at a known id, replacing any existing payload.
    pub async fn set(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_online()?;
        let resolved = resolve_sentinels(None, fields);
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), resolved);
        inner.broadcast(collection);
        Ok(())
    }

    /// Merge the given top-level fields into an existing document.
    pub async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_online()?;
        let existing = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| Error::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let Value::Object(updates) = fields else {
            return Err(Error::InvalidArgument(
                "update payload must be a JSON object".to_string(),
            ));
        };
        let Value::Object(target) = existing else {
            return Err(Error::InvalidDocument {
                collection: collection.to_string(),
                reason: format!("document {id} is not an object"),
            });
        };
        for (key, incoming) in updates {
            let resolved = resolve_sentinels(target.get(&key), incoming);
            target.insert(key, resolved);
        }
        inner.broadcast(collection);
        Ok(())
    }

    /// Read a single document. Missing documents read as `None`.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.lock();
        inner.ensure_online()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    /// Delete a document. Deleting a missing document is a no-op.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_online()?;
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            inner.broadcast(collection);
        }
        Ok(())
    }

    /// Drop an entire collection (used for sub-collection cascade).
    pub async fn drop_collection(&self, collection: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_online()?;
        if inner.collections.remove(collection).is_some() {
            inner.broadcast(collection);
        }
        Ok(())
    }

    /// One-shot filtered read of a collection, in insertion (id) order.
    pub async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let inner = self.lock();
        inner.ensure_online()?;
        Ok(inner.snapshot(collection, filter))
    }

    /// Open a live query. The current matching set is delivered immediately,
    /// then again after every change to the collection.
    pub fn live_query(&self, collection: &str, filter: Filter) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        let initial = inner.snapshot(collection, &filter);
        // Delivery order is guaranteed: the initial snapshot is enqueued
        // before the subscriber can observe any later broadcast.
        let _ = sender.send(initial);
        inner.subscribers.push(Subscriber {
            id,
            collection: collection.to_string(),
            filter,
            sender,
        });
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
            receiver,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // Lock poisoning only happens if a holder panicked; state is
        // plain data, so continue with whatever is there.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A cancellable live query handle.
///
/// Dropping the handle tears the subscription down; this is the mandatory
/// resource-release contract for owning views.
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<StoreInner>>,
    receiver: mpsc::UnboundedReceiver<Vec<Document>>,
}

impl Subscription {
    /// Wait for the next full snapshot. `None` after cancellation once the
    /// queue drains.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.receiver.recv().await
    }

    /// Non-blocking read of an already-delivered snapshot.
    pub fn try_next(&mut self) -> Option<Vec<Document>> {
        self.receiver.try_recv().ok()
    }

    /// Stop all further deliveries.
    pub fn cancel(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            inner.subscribers.retain(|sub| sub.id != self.id);
        }
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run a store operation with bounded retry on transient failures.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                tracing::debug!(attempt, error = %err, "retrying transient store failure");
                tokio::time::sleep(Duration::from_millis(policy.delay_ms)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn resolve_sentinels(existing: Option<&Value>, incoming: Value) -> Value {
    let Value::Object(map) = incoming else {
        return incoming;
    };

    if map.contains_key(SERVER_TIMESTAMP_KEY) {
        return Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
    }

    if let Some(Value::Array(additions)) = map.get(ARRAY_UNION_KEY) {
        let mut merged = match existing {
            Some(Value::Array(current)) => current.clone(),
            _ => Vec::new(),
        };
        for value in additions {
            if !merged.contains(value) {
                merged.push(value.clone());
            }
        }
        return Value::Array(merged);
    }

    if let Some(Value::Array(removals)) = map.get(ARRAY_REMOVE_KEY) {
        let mut remaining = match existing {
            Some(Value::Array(current)) => current.clone(),
            _ => Vec::new(),
        };
        remaining.retain(|value| !removals.contains(value));
        return Value::Array(remaining);
    }

    let resolved = map
        .into_iter()
        .map(|(key, value)| {
            let nested_existing = existing.and_then(|current| current.get(&key));
            let value = resolve_sentinels(nested_existing, value);
            (key, value)
        })
        .collect();
    Value::Object(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_timestamp_resolves_on_write() {
        let store = MemoryStore::new();
        let id = store
            .create(
                "tasks",
                json!({ "title": "T", "createdAt": MemoryStore::server_timestamp() }),
            )
            .await
            .expect("create");
        let doc = store.get("tasks", &id).await.expect("get").expect("doc");
        let raw = doc.fields["createdAt"].as_str().expect("string timestamp");
        assert!(chrono::DateTime::parse_from_rfc3339(raw).is_ok());
    }

    #[tokio::test]
    async fn array_union_and_remove_merge_against_existing() {
        let store = MemoryStore::new();
        store
            .set("companies", "c1", json!({ "members": ["a"] }))
            .await
            .expect("set");
        store
            .update(
                "companies",
                "c1",
                json!({ "members": MemoryStore::array_union(vec![json!("b"), json!("a")]) }),
            )
            .await
            .expect("union");
        let doc = store.get("companies", "c1").await.unwrap().unwrap();
        assert_eq!(doc.fields["members"], json!(["a", "b"]));

        store
            .update(
                "companies",
                "c1",
                json!({ "members": MemoryStore::array_remove(vec![json!("a")]) }),
            )
            .await
            .expect("remove");
        let doc = store.get("companies", "c1").await.unwrap().unwrap();
        assert_eq!(doc.fields["members"], json!(["b"]));
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("tasks", "missing", json!({ "status": "done" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get("tasks", "t1").await,
            Err(Error::Offline)
        ));
        assert!(matches!(
            store.create("tasks", json!({})).await,
            Err(Error::Offline)
        ));
        store.set_offline(false);
        assert!(store.get("tasks", "t1").await.expect("online").is_none());
    }

    #[tokio::test]
    async fn live_query_delivers_initial_and_subsequent_snapshots() {
        let store = MemoryStore::new();
        store
            .set("tasks", "t1", json!({ "companyId": "c1", "title": "one" }))
            .await
            .unwrap();

        let mut sub = store.live_query("tasks", Filter::field_eq("companyId", "c1"));
        let initial = sub.next().await.expect("initial snapshot");
        assert_eq!(initial.len(), 1);

        store
            .set("tasks", "t2", json!({ "companyId": "c1", "title": "two" }))
            .await
            .unwrap();
        let updated = sub.next().await.expect("second snapshot");
        assert_eq!(updated.len(), 2);

        // A document in another workspace changes the collection but not
        // the matching set; the delivery still carries the full set.
        store
            .set("tasks", "t3", json!({ "companyId": "c2", "title": "other" }))
            .await
            .unwrap();
        let unchanged = sub.next().await.expect("third snapshot");
        assert_eq!(unchanged.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_subscription_receives_nothing_further() {
        let store = MemoryStore::new();
        let mut sub = store.live_query("tasks", Filter::All);
        assert!(sub.next().await.expect("initial").is_empty());

        sub.cancel();
        store
            .set("tasks", "t1", json!({ "title": "after cancel" }))
            .await
            .unwrap();
        assert!(sub.try_next().is_none());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn with_retry_recovers_after_transient_failure() {
        let policy = RetryConfig {
            max_attempts: 3,
            delay_ms: 0,
        };
        let mut failures = 2;
        let result = with_retry(&policy, || {
            let fail = failures > 0;
            if fail {
                failures -= 1;
            }
            async move {
                if fail {
                    Err(Error::Offline)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.expect("recovered"), 42);
    }

    #[tokio::test]
    async fn with_retry_gives_up_on_permanent_failure() {
        let policy = RetryConfig {
            max_attempts: 3,
            delay_ms: 0,
        };
        let mut calls = 0;
        let result: Result<()> = with_retry(&policy, || {
            calls += 1;
            async { Err(Error::EmptyTitle) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
