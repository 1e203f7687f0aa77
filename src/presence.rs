//! "Who's here" estimate: distinct authors among a room's most recent
//! messages, restricted to a recency window.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::models::{Message, Room, User};
use crate::notify::Notifier;
use crate::store::{paths, Direction, DocumentStore, Query};
use crate::users;

pub struct PresenceEstimator {
    store: Arc<dyn DocumentStore>,
    window: Duration,
    sample_size: usize,
}

impl PresenceEstimator {
    pub fn new(store: Arc<dyn DocumentStore>, window: Duration, sample_size: usize) -> Self {
        Self {
            store,
            window,
            sample_size,
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        Self::new(store, config.presence_window(), config.presence_sample_size)
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub async fn active_users(&self, room: &Room) -> AppResult<Vec<User>> {
        self.active_users_at(room, Utc::now()).await
    }

    /// Profiles of recent authors, in order of their latest message.
    /// Authors without a profile are left out.
    pub async fn active_users_at(&self, room: &Room, now: DateTime<Utc>) -> AppResult<Vec<User>> {
        let docs = self
            .store
            .query(
                &paths::messages(room),
                &Query::new()
                    .order_by("timestamp", Direction::Desc)
                    .limit(self.sample_size),
            )
            .await?;

        let messages: Vec<Message> = docs.iter().filter_map(|d| d.decode().ok()).collect();

        let mut active = Vec::new();
        for uid in recent_authors(&messages, self.cutoff(now)) {
            if let Some(user) = users::load_user(self.store.as_ref(), &uid).await? {
                active.push(user);
            }
        }
        Ok(active)
    }

    pub async fn active_user_count(&self, room: &Room) -> AppResult<usize> {
        Ok(self.active_users(room).await?.len())
    }

    /// Like [`active_users`](Self::active_users) but failures read as an
    /// empty room.
    pub async fn active_users_or_empty(&self, room: &Room) -> Vec<User> {
        match self.active_users(room).await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(room = room.id(), "Presence lookup failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Distinct author uids of messages at or after `cutoff`, first occurrence
/// wins. Messages with unparseable timestamps never count as recent.
pub fn recent_authors(messages: &[Message], cutoff: DateTime<Utc>) -> Vec<String> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|m| {
            DateTime::parse_from_rfc3339(&m.timestamp)
                .map(|ts| ts.with_timezone(&Utc) >= cutoff)
                .unwrap_or(false)
        })
        .filter_map(|m| m.author_uid.clone())
        .filter(|uid| seen.insert(uid.clone()))
        .collect()
}

/// Periodically refreshes the active-user list for one room.
pub struct PresencePoller {
    room: Room,
    users: watch::Receiver<Vec<User>>,
    refresh: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl PresencePoller {
    /// Polls immediately, then every `interval`. Failures are reported to
    /// `notifier` and leave the last list in place.
    pub fn spawn(
        estimator: Arc<PresenceEstimator>,
        room: Room,
        interval: Duration,
        notifier: Notifier,
    ) -> Self {
        let (tx, users) = watch::channel(Vec::new());
        let (refresh, mut refresh_rx) = mpsc::unbounded_channel();
        let poll_room = room.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    msg = refresh_rx.recv() => {
                        if msg.is_none() {
                            break;
                        }
                    }
                }
                match estimator.active_users(&poll_room).await {
                    Ok(active) => {
                        tx.send_replace(active);
                    }
                    Err(e) => {
                        notifier.report("presence", &e);
                    }
                }
            }
        });

        Self {
            room,
            users,
            refresh,
            task,
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn users(&self) -> Vec<User> {
        self.users.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<User>> {
        self.users.clone()
    }

    /// Poll now instead of waiting for the next tick.
    pub fn refresh(&self) {
        let _ = self.refresh.send(());
    }
}

impl Drop for PresencePoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
