//! User-visible notices: failed gateway calls, login prompts and the like.
//!
//! Components report failures here instead of propagating them; the UI
//! layer renders `active()` and listens on `subscribe()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    /// Which component raised it (`presence`, `feed`, ...).
    pub context: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

struct Inner {
    notices: DashMap<u64, Notice>,
    next_id: AtomicU64,
    tx: broadcast::Sender<Notice>,
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                notices: DashMap::new(),
                next_id: AtomicU64::new(1),
                tx,
            }),
        }
    }

    pub fn push(&self, level: NoticeLevel, context: &str, message: impl Into<String>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let notice = Notice {
            id,
            level,
            context: context.to_string(),
            message: message.into(),
            created_at: Utc::now(),
        };
        self.inner.notices.insert(id, notice.clone());
        // No listeners is fine
        let _ = self.inner.tx.send(notice);
        id
    }

    pub fn info(&self, context: &str, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Info, context, message)
    }

    /// Log a failure and surface its user-facing text.
    pub fn report(&self, context: &str, error: &AppError) -> u64 {
        tracing::warn!(context, "Operation failed: {}", error);
        self.push(NoticeLevel::Error, context, error.user_message())
    }

    pub fn dismiss(&self, id: u64) -> bool {
        self.inner.notices.remove(&id).is_some()
    }

    /// Undismissed notices, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        let mut notices: Vec<Notice> = self
            .inner
            .notices
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        notices.sort_by_key(|n| n.id);
        notices
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_hides_internal_details() {
        let notifier = Notifier::default();
        let id = notifier.report("presence", &AppError::Gateway("socket reset".into()));

        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert_eq!(active[0].level, NoticeLevel::Error);
        assert!(!active[0].message.contains("socket reset"));
    }

    #[test]
    fn dismiss_removes_once() {
        let notifier = Notifier::default();
        let first = notifier.info("chat", "one");
        let second = notifier.info("chat", "two");

        assert!(notifier.dismiss(first));
        assert!(!notifier.dismiss(first));
        let remaining: Vec<_> = notifier.active().into_iter().map(|n| n.id).collect();
        assert_eq!(remaining, vec![second]);
    }

    #[tokio::test]
    async fn subscribers_receive_new_notices() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.push(NoticeLevel::Info, "chat", "You must log in");
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.message, "You must log in");
        assert_eq!(notice.context, "chat");
    }
}
