use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::auth::Role;
use crate::model::{now_ms, Ms};
use crate::observability;

const OUTBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: Ulid,
    pub title: String,
    pub message: String,
    pub role: Role,
    pub created_at: Ms,
    pub read: bool,
}

impl Notification {
    pub fn for_user(user_id: Ulid, title: &str, message: String) -> Self {
        Self {
            user_id,
            title: title.to_string(),
            message,
            role: Role::User,
            created_at: now_ms(),
            read: false,
        }
    }
}

/// Fire-and-forget outbox for lifecycle notifications.
///
/// Transitions enqueue without blocking; a background task drains the queue
/// into a per-user feed. A full or closed queue drops the notification (and
/// counts the drop) — delivery never gates or fails the primary operation.
pub struct NotificationHub {
    tx: mpsc::Sender<Notification>,
    feed: Arc<DashMap<Ulid, Vec<Notification>>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(OUTBOX_CAPACITY);
        let feed: Arc<DashMap<Ulid, Vec<Notification>>> = Arc::new(DashMap::new());
        let sink = feed.clone();
        tokio::spawn(async move {
            while let Some(n) = rx.recv().await {
                sink.entry(n.user_id).or_default().push(n);
            }
        });
        Self { tx, feed }
    }

    /// Outbox without a drain task, so saturation behavior is observable.
    #[cfg(test)]
    pub fn detached(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        std::mem::forget(rx); // keep the channel open, undrained
        Self {
            tx,
            feed: Arc::new(DashMap::new()),
        }
    }

    pub fn enqueue(&self, notification: Notification) {
        if self.tx.try_send(notification).is_err() {
            metrics::counter!(observability::NOTIFICATIONS_DROPPED_TOTAL).increment(1);
            tracing::warn!("notification outbox saturated, dropping");
        }
    }

    /// Snapshot of a user's feed, oldest first.
    pub fn feed_for(&self, user_id: &Ulid) -> Vec<Notification> {
        self.feed
            .get(user_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }
}
