//! Live message feed for one room: subscribes to the room's messages in
//! ascending timestamp order and joins each message with its author.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::errors::AppResult;
use crate::models::{Message, MessageView, Room, User};
use crate::store::{paths, Direction, Document, DocumentStore, Query, SubscriptionHandle};
use crate::users;

/// Author profiles keyed by uid, with a TTL.
///
/// Misses are cached too, so a deleted author is not re-read for every
/// snapshot. Lookup failures are not cached.
pub struct AuthorCache {
    store: Arc<dyn DocumentStore>,
    ttl: Duration,
    entries: DashMap<String, (Option<User>, Instant)>,
    reads: AtomicUsize,
}

impl AuthorCache {
    pub fn new(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: DashMap::new(),
            reads: AtomicUsize::new(0),
        }
    }

    pub async fn get(&self, uid: &str) -> Option<User> {
        if let Some(entry) = self.entries.get(uid) {
            let (user, fetched_at) = entry.value();
            if fetched_at.elapsed() < self.ttl {
                return user.clone();
            }
        }

        self.reads.fetch_add(1, Ordering::Relaxed);
        match users::load_user(self.store.as_ref(), uid).await {
            Ok(user) => {
                self.entries
                    .insert(uid.to_string(), (user.clone(), Instant::now()));
                user
            }
            Err(e) => {
                tracing::warn!(uid, "Author lookup failed: {}", e);
                None
            }
        }
    }

    /// Resolve each distinct uid once.
    pub async fn resolve_many(&self, uids: Vec<String>) -> HashMap<String, User> {
        let mut seen = HashSet::new();
        let mut resolved = HashMap::new();
        for uid in uids {
            if !seen.insert(uid.clone()) {
                continue;
            }
            if let Some(user) = self.get(&uid).await {
                resolved.insert(uid, user);
            }
        }
        resolved
    }

    /// Drop a cached profile after the user edits it.
    pub fn invalidate(&self, uid: &str) {
        self.entries.remove(uid);
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, fetched_at)| fetched_at.elapsed() < ttl);
    }

    /// Store reads made so far (cache misses).
    pub fn point_reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

/// Join a snapshot with author profiles.
///
/// Malformed documents are skipped. Messages without an author uid, or whose
/// author is gone, are kept without profile fields.
pub async fn project(batch: &[Document], authors: &AuthorCache) -> Vec<MessageView> {
    let messages: Vec<Message> = batch
        .iter()
        .filter_map(|doc| match doc.decode::<Message>() {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(id = %doc.id, "Skipping malformed message: {}", e);
                None
            }
        })
        .collect();

    let uids: Vec<String> = messages
        .iter()
        .filter_map(|m| m.author_uid.clone())
        .collect();
    let profiles = authors.resolve_many(uids).await;

    messages
        .into_iter()
        .map(|message| {
            let user = message
                .author_uid
                .as_deref()
                .and_then(|uid| profiles.get(uid))
                .cloned();
            MessageView {
                author_photo_url: user
                    .as_ref()
                    .and_then(|u| u.effective_photo())
                    .map(String::from),
                user_info: user,
                message,
            }
        })
        .collect()
}

/// One mounted feed. Closing it (or dropping it) tears the live query down.
pub struct MessageFeed {
    room: Room,
    view: watch::Receiver<Vec<MessageView>>,
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

impl MessageFeed {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        authors: Arc<AuthorCache>,
        room: Room,
    ) -> AppResult<Self> {
        let subscription = store
            .subscribe(
                &paths::messages(&room),
                Query::new().order_by("timestamp", Direction::Asc),
            )
            .await?;
        let (batches, handle) = subscription.split();
        let (tx, view) = watch::channel(Vec::new());

        tracing::debug!(room = room.id(), "Message feed opened");
        let task = tokio::spawn(run_projection(batches, authors, tx));

        Ok(Self {
            room,
            view,
            handle,
            task,
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_active()
    }

    /// Latest projected snapshot.
    pub fn messages(&self) -> Vec<MessageView> {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<MessageView>> {
        self.view.clone()
    }

    /// Wait for the next snapshot. `None` once the feed is closed.
    pub async fn changed(&mut self) -> Option<Vec<MessageView>> {
        if !self.is_open() {
            return None;
        }
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    /// Returns `true` the first time only.
    pub fn close(&mut self) -> bool {
        if !self.handle.unsubscribe() {
            return false;
        }
        self.task.abort();
        tracing::debug!(room = self.room.id(), "Message feed closed");
        true
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_projection(
    mut batches: mpsc::UnboundedReceiver<Vec<Document>>,
    authors: Arc<AuthorCache>,
    tx: watch::Sender<Vec<MessageView>>,
) {
    while let Some(batch) = batches.recv().await {
        let views = project(&batch, &authors).await;
        if tx.send(views).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn seed_user(store: &MemoryStore, uid: &str, name: &str, photo: Option<&str>) {
        store
            .set(
                &paths::user(uid),
                json!({"uid": uid, "username": name, "profilePicture": photo}),
                false,
            )
            .await
            .unwrap();
    }

    fn strings(uids: &[&str]) -> Vec<String> {
        uids.iter().map(|s| s.to_string()).collect()
    }

    fn assert_send<T: Send>(_: &T) {}

    fn message(uid: Option<&str>, text: &str, ts: &str) -> serde_json::Value {
        json!({"text": text, "authorName": "x", "authorUid": uid, "timestamp": ts})
    }

    #[tokio::test]
    async fn projection_joins_authors_and_keeps_order() {
        let store = MemoryStore::new();
        seed_user(&store, "u1", "Lisa", Some("https://img/lisa.png")).await;
        let authors = AuthorCache::new(Arc::new(store.clone()), Duration::from_secs(60));

        let batch = vec![
            Document {
                id: "m1".into(),
                data: message(Some("u1"), "first", "2024-05-01T10:00:00Z"),
            },
            Document {
                id: "m2".into(),
                data: message(None, "anonymous", "2024-05-01T10:00:01Z"),
            },
            Document {
                id: "m3".into(),
                data: message(Some("ghost"), "gone", "2024-05-01T10:00:02Z"),
            },
            Document {
                id: "bad".into(),
                data: json!({"text": 5}),
            },
        ];

        let views = project(&batch, &authors).await;
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].message.id, "m1");
        assert_eq!(views[0].author_photo_url.as_deref(), Some("https://img/lisa.png"));
        assert_eq!(views[0].user_info.as_ref().unwrap().username, "Lisa");
        assert!(views[1].user_info.is_none());
        assert!(views[2].user_info.is_none());
        assert!(views[2].author_photo_url.is_none());
    }

    #[tokio::test]
    async fn projection_can_run_on_a_spawned_task() {
        let store = MemoryStore::new();
        let authors = Arc::new(AuthorCache::new(
            Arc::new(store.clone()),
            Duration::from_secs(60),
        ));
        let batch = vec![Document {
            id: "m1".into(),
            data: message(Some("u1"), "hi", "2024-05-01T10:00:00Z"),
        }];

        let projection = {
            let authors = authors.clone();
            async move { project(&batch, &authors).await }
        };
        assert_send(&projection);
        let views = tokio::spawn(projection).await.unwrap();
        assert_eq!(views.len(), 1);
    }

    #[tokio::test]
    async fn author_cache_reads_each_uid_once_within_ttl() {
        let store = MemoryStore::new();
        seed_user(&store, "u1", "Lisa", None).await;
        let authors = AuthorCache::new(Arc::new(store.clone()), Duration::from_secs(60));

        let resolved = authors
            .resolve_many(strings(&["u1", "u1", "ghost", "ghost"]))
            .await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(authors.point_reads(), 2);

        authors.resolve_many(strings(&["u1", "ghost"])).await;
        assert_eq!(authors.point_reads(), 2);

        authors.invalidate("u1");
        authors.get("u1").await;
        assert_eq!(authors.point_reads(), 3);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let store = MemoryStore::new();
        seed_user(&store, "u1", "Lisa", None).await;
        let authors = AuthorCache::new(Arc::new(store.clone()), Duration::ZERO);

        authors.get("u1").await;
        authors.get("u1").await;
        assert_eq!(authors.point_reads(), 2);
        authors.purge_expired();
    }

    #[tokio::test]
    async fn feed_streams_snapshots_until_closed() {
        let store = MemoryStore::new();
        seed_user(&store, "u1", "Lisa", None).await;
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let authors = Arc::new(AuthorCache::new(shared.clone(), Duration::from_secs(60)));
        let room = Room::Livestream("abc123".into());

        let mut feed = MessageFeed::open(shared.clone(), authors, room.clone())
            .await
            .unwrap();
        assert_eq!(store.active_subscriptions(), 1);

        store
            .add(
                &paths::messages(&room),
                message(Some("u1"), "second", "2024-05-01T10:00:02Z"),
            )
            .await
            .unwrap();
        store
            .add(
                &paths::messages(&room),
                message(Some("u1"), "first", "2024-05-01T10:00:01Z"),
            )
            .await
            .unwrap();

        let views = loop {
            let views = feed.changed().await.unwrap();
            if views.len() == 2 {
                break views;
            }
        };
        assert_eq!(views[0].message.text, "first");
        assert_eq!(views[1].message.text, "second");

        assert!(feed.close());
        assert!(!feed.close());
        assert_eq!(store.active_subscriptions(), 0);
        assert!(feed.changed().await.is_none());
    }

    #[tokio::test]
    async fn dropping_feed_unsubscribes() {
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let authors = Arc::new(AuthorCache::new(shared.clone(), Duration::from_secs(60)));

        let feed = MessageFeed::open(shared, authors, Room::PrivateChat("c1".into()))
            .await
            .unwrap();
        assert_eq!(store.active_subscriptions(), 1);
        drop(feed);
        assert_eq!(store.active_subscriptions(), 0);
    }
}
