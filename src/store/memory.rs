use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{set_field, split_path, Document, DocumentStore, Query, Subscription};
use crate::errors::{AppError, AppResult};

struct Subscriber {
    collection: String,
    query: Query,
    tx: mpsc::UnboundedSender<Vec<Document>>,
    last: Option<Vec<Document>>,
}

#[derive(Default)]
struct Inner {
    /// collection path → document id → data
    collections: DashMap<String, BTreeMap<String, Value>>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscription: AtomicU64,
    unavailable: AtomicBool,
}

/// In-memory document store for single-instance mode and tests.
///
/// Every write to a collection re-runs the live queries registered on it and
/// pushes the new snapshot to subscribers whose result set changed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while unavailable every operation fails with a
    /// gateway error.
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> AppResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("document store unavailable".into()));
        }
        Ok(())
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push fresh snapshots to every live query on `collection`.
    ///
    /// The snapshot is taken while the subscriber entry is locked, so
    /// concurrent writers deliver in the order they read.
    fn publish(&self, collection: &str) {
        let mut closed = Vec::new();
        for mut entry in self.inner.subscribers.iter_mut() {
            if entry.collection != collection {
                continue;
            }
            let batch = entry.query.apply(self.snapshot(collection));
            if entry.last.as_ref() == Some(&batch) {
                continue;
            }
            if entry.tx.send(batch.clone()).is_err() {
                closed.push(*entry.key());
                continue;
            }
            entry.last = Some(batch);
        }
        for id in closed {
            self.inner.subscribers.remove(&id);
        }
    }

    fn with_existing<R>(
        &self,
        path: &str,
        f: impl FnOnce(&mut Value) -> AppResult<R>,
    ) -> AppResult<R> {
        let (collection, id) = split_path(path)?;
        let result = {
            let mut docs = self
                .inner
                .collections
                .get_mut(collection)
                .ok_or_else(|| AppError::NotFound(format!("No document at {path}")))?;
            let data = docs
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("No document at {path}")))?;
            f(data)?
        };
        self.publish(collection);
        Ok(result)
    }
}

fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => merge_into(slot, value),
                    _ => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> AppResult<Option<Document>> {
        self.check_available()?;
        let (collection, id) = split_path(path)?;
        Ok(self.inner.collections.get(collection).and_then(|docs| {
            docs.get(id).map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            })
        }))
    }

    async fn set(&self, path: &str, data: Value, merge: bool) -> AppResult<()> {
        self.check_available()?;
        let (collection, id) = split_path(path)?;
        {
            let mut docs = self
                .inner
                .collections
                .entry(collection.to_string())
                .or_default();
            match docs.get_mut(id) {
                Some(existing) if merge => merge_into(existing, data),
                _ => {
                    docs.insert(id.to_string(), data);
                }
            }
        }
        self.publish(collection);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Value) -> AppResult<String> {
        self.check_available()?;
        let id = Uuid::new_v4().simple().to_string();
        self.inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        self.publish(collection);
        Ok(id)
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> AppResult<()> {
        self.check_available()?;
        self.with_existing(path, |data| {
            for (field, value) in fields {
                set_field(data, &field, value);
            }
            Ok(())
        })
    }

    async fn increment(&self, path: &str, field: &str, by: i64) -> AppResult<()> {
        self.check_available()?;
        self.with_existing(path, |data| {
            let current = super::field_value(data, field)
                .and_then(Value::as_i64)
                .unwrap_or(0);
            set_field(data, field, Value::from(current + by));
            Ok(())
        })
    }

    async fn array_union(&self, path: &str, field: &str, value: Value) -> AppResult<bool> {
        self.check_available()?;
        self.with_existing(path, |data| {
            let mut items = super::field_value(data, field)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if items.contains(&value) {
                return Ok(false);
            }
            items.push(value);
            set_field(data, field, Value::Array(items));
            Ok(true)
        })
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        self.check_available()?;
        let (collection, id) = split_path(path)?;
        let removed = self
            .inner
            .collections
            .get_mut(collection)
            .and_then(|mut docs| docs.remove(id))
            .is_some();
        if removed {
            self.publish(collection);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        self.check_available()?;
        Ok(query.apply(self.snapshot(collection)))
    }

    async fn subscribe(&self, collection: &str, query: Query) -> AppResult<Subscription> {
        self.check_available()?;
        let id = self.inner.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.subscribers.insert(
            id,
            Subscriber {
                collection: collection.to_string(),
                query,
                tx,
                last: None,
            },
        );

        // Initial snapshot, delivered even when empty.
        if let Some(mut entry) = self.inner.subscribers.get_mut(&id) {
            let batch = entry.query.apply(self.snapshot(collection));
            if entry.tx.send(batch.clone()).is_ok() {
                entry.last = Some(batch);
            }
        }

        tracing::debug!(subscription = id, collection, "Live query registered");

        let inner = self.inner.clone();
        Ok(Subscription::new(id, rx, move || {
            inner.subscribers.remove(&id);
            tracing::debug!(subscription = id, "Live query removed");
        }))
    }

    fn active_subscriptions(&self) -> usize {
        self.inner.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_and_merge() {
        let store = MemoryStore::new();
        store
            .set("users/u1", json!({"username": "a", "meta": {"x": 1}}), false)
            .await
            .unwrap();
        store
            .set("users/u1", json!({"meta": {"y": 2}}), true)
            .await
            .unwrap();

        let doc = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"username": "a", "meta": {"x": 1, "y": 2}}));

        store.set("users/u1", json!({"username": "b"}), false).await.unwrap();
        let doc = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"username": "b"}));
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("users/missing", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();
        store.set("m/1", json!({"text": "hi"}), false).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.increment("m/1", "reactions.🔥", 1).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let doc = store.get("m/1").await.unwrap().unwrap();
        assert_eq!(doc.data["reactions"]["🔥"], 50);
    }

    #[tokio::test]
    async fn array_union_reports_whether_added() {
        let store = MemoryStore::new();
        store
            .set("privateChats/c1", json!({"invitedUsers": ["u1"]}), false)
            .await
            .unwrap();
        assert!(!store.array_union("privateChats/c1", "invitedUsers", json!("u1")).await.unwrap());
        assert!(store.array_union("privateChats/c1", "invitedUsers", json!("u2")).await.unwrap());

        let doc = store.get("privateChats/c1").await.unwrap().unwrap();
        assert_eq!(doc.data["invitedUsers"], json!(["u1", "u2"]));
    }

    #[tokio::test]
    async fn subscription_delivers_initial_and_changed_snapshots() {
        let store = MemoryStore::new();
        store
            .set("rooms/r/messages/a", json!({"timestamp": "2024-01-01T00:00:01Z"}), false)
            .await
            .unwrap();

        let mut sub = store
            .subscribe(
                "rooms/r/messages",
                Query::new().order_by("timestamp", Direction::Asc),
            )
            .await
            .unwrap();
        assert_eq!(store.active_subscriptions(), 1);

        let initial = sub.next_batch().await.unwrap();
        assert_eq!(initial.len(), 1);

        store
            .add("rooms/r/messages", json!({"timestamp": "2024-01-01T00:00:02Z"}))
            .await
            .unwrap();
        let next = sub.next_batch().await.unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].id, "a");

        // Writes elsewhere do not wake this subscriber.
        store.set("users/u1", json!({}), false).await.unwrap();

        assert!(sub.unsubscribe());
        assert_eq!(store.active_subscriptions(), 0);
        assert!(sub.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let store = MemoryStore::new();
        let sub = store.subscribe("c", Query::new()).await.unwrap();
        assert_eq!(store.active_subscriptions(), 1);
        drop(sub);
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn unavailable_store_fails_with_gateway_error() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.get("users/u1").await.unwrap_err(),
            AppError::Gateway(_)
        ));
        store.set_available(true);
        assert!(store.get("users/u1").await.unwrap().is_none());
    }
}
