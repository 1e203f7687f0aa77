//! Document store gateway.
//!
//! The chat core talks to a hierarchical document database (collections of
//! JSON documents, some with subcollections) through [`DocumentStore`]. The
//! in-memory backend in [`memory`] is used by the companion server in
//! single-instance mode and by every test.

pub mod memory;
pub mod paths;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::errors::{AppError, AppResult};

pub use memory::MemoryStore;

/// A document as returned by reads, queries and subscription snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Decode into a model, exposing the document id as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.entry("id")
                .or_insert_with(|| Value::String(self.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    ArrayContains(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Equality/array-contains filters, one ordering field and a limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters
            .push(Filter::ArrayContains(field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(field, expected) => field_value(data, field) == Some(expected),
            Filter::ArrayContains(field, expected) => field_value(data, field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(expected)),
        })
    }

    /// Filter, order and truncate a collection snapshot.
    ///
    /// Documents missing the ordering field are excluded, ties break on id.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();

        if let Some((field, direction)) = &self.order_by {
            out.retain(|d| field_value(&d.data, field).is_some());
            out.sort_by(|a, b| {
                let ord = compare_values(
                    field_value(&a.data, field).unwrap_or(&Value::Null),
                    field_value(&b.data, field).unwrap_or(&Value::Null),
                )
                .then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Resolve a dotted field path (`reactions.🔥`) inside a document.
pub fn field_value<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, key| current.as_object()?.get(key))
}

/// Set a dotted field path, creating intermediate maps as needed.
pub fn set_field(data: &mut Value, path: &str, value: Value) {
    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
    let mut current = data;
    let mut parts = path.split('.').peekable();
    while let Some(key) = parts.next() {
        let Value::Object(map) = current else { return };
        if parts.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry;
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Split `collection/.../docId` into its parent collection and document id.
pub fn split_path(path: &str) -> AppResult<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() => Ok((collection, id)),
        _ => Err(AppError::Validation(format!("Invalid document path '{path}'"))),
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Owner of a live query registration. Dropping it unsubscribes.
pub struct SubscriptionHandle {
    id: u64,
    cancel: Option<CancelFn>,
}

impl SubscriptionHandle {
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Returns `true` only the first time; later calls are no-ops.
    pub fn unsubscribe(&mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) => {
                cancel();
                tracing::debug!(subscription = self.id, "Live query closed");
                true
            }
            None => false,
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// A live query: every change to the matching result set delivers the full
/// ordered snapshot.
pub struct Subscription {
    batches: mpsc::UnboundedReceiver<Vec<Document>>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub fn new(
        id: u64,
        batches: mpsc::UnboundedReceiver<Vec<Document>>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            batches,
            handle: SubscriptionHandle {
                id,
                cancel: Some(Box::new(cancel)),
            },
        }
    }

    pub async fn next_batch(&mut self) -> Option<Vec<Document>> {
        if !self.handle.is_active() {
            return None;
        }
        self.batches.recv().await
    }

    pub fn unsubscribe(&mut self) -> bool {
        self.handle.unsubscribe()
    }

    /// Separate the snapshot stream from the registration so one task can
    /// drain batches while another owns teardown.
    pub fn split(self) -> (mpsc::UnboundedReceiver<Vec<Document>>, SubscriptionHandle) {
        (self.batches, self.handle)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> AppResult<Option<Document>>;

    /// Write a whole document; with `merge`, nested maps are merged into the
    /// existing document instead of replacing it.
    async fn set(&self, path: &str, data: Value, merge: bool) -> AppResult<()>;

    /// Create a document with a generated id.
    async fn add(&self, collection: &str, data: Value) -> AppResult<String>;

    /// Update dotted fields of an existing document.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> AppResult<()>;

    /// Atomically add `by` to a numeric field (missing counts as zero).
    async fn increment(&self, path: &str, field: &str, by: i64) -> AppResult<()>;

    /// Atomically append to an array field unless already present.
    /// Returns whether the value was added.
    async fn array_union(&self, path: &str, field: &str, value: Value) -> AppResult<bool>;

    async fn delete(&self, path: &str) -> AppResult<()>;

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>>;

    async fn subscribe(&self, collection: &str, query: Query) -> AppResult<Subscription>;

    /// Number of live subscriptions that have not been torn down.
    fn active_subscriptions(&self) -> usize;
}
