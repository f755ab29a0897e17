//! In-process notification register.
//!
//! Nothing here is persisted. State is published through two `watch`
//! channels (the ordered list and the unread counter) and through callbacks
//! registered with [`NotificationService::subscribe`].

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::core::db::{Priority, Task, now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub priority: Priority,
    pub read: bool,
    /// User the notification is meant for; consumers filter on it.
    #[serde(default)]
    pub recipient: Option<i64>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            date: now(),
            priority,
            read: false,
            recipient: None,
        }
    }

    pub fn to(mut self, recipient: Option<i64>) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn task_assigned(task: &Task) -> Self {
        Self::new(
            "New Task Assigned",
            format!("You have been assigned a new task: {}", task.name),
            task.priority,
        )
        .to(task.owner_id)
    }

    pub fn task_status_changed(task: &Task) -> Self {
        Self::new(
            "Task Status Changed",
            format!("Task {} is now {}", task.name, task.status),
            task.priority,
        )
        .to(task.owner_id)
    }

    /// Worth an alert rather than just a counter bump.
    pub fn is_alert(&self) -> bool {
        matches!(self.priority, Priority::Medium | Priority::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&[Notification], usize) + Send + Sync>;

pub struct NotificationService {
    notifications: watch::Sender<Vec<Notification>>,
    unread: watch::Sender<usize>,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("notifications", &self.notifications.borrow().len())
            .field("unread", &*self.unread.borrow())
            .finish()
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService {
    pub fn new() -> Self {
        Self {
            notifications: watch::Sender::new(Vec::new()),
            unread: watch::Sender::new(0),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub fn send(&self, notification: Notification) {
        let unread = !notification.read;
        self.notifications.send_modify(|list| list.push(notification));
        if unread {
            self.unread.send_modify(|count| *count += 1);
        }
        self.notify_subscribers();
    }

    /// Live view of every notification in arrival order.
    pub fn list(&self) -> watch::Receiver<Vec<Notification>> {
        self.notifications.subscribe()
    }

    /// Live view of the unread counter.
    pub fn unread_count(&self) -> watch::Receiver<usize> {
        self.unread.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.notifications.borrow().last().cloned()
    }

    /// The newest notification, if it is important enough to alert on.
    pub fn latest_alert(&self) -> Option<Notification> {
        self.latest().filter(Notification::is_alert)
    }

    pub fn for_recipient(&self, user_id: i64) -> Vec<Notification> {
        self.notifications
            .borrow()
            .iter()
            .filter(|n| n.recipient == Some(user_id))
            .cloned()
            .collect()
    }

    pub fn mark_all_as_read(&self) {
        self.notifications.send_modify(|list| {
            for notification in list.iter_mut() {
                notification.read = true;
            }
        });
        self.unread.send_replace(0);
        self.notify_subscribers();
    }

    pub fn clear_all_notifications(&self) {
        self.notifications.send_replace(Vec::new());
        self.unread.send_replace(0);
        self.notify_subscribers();
    }

    /// Call `callback` now with the current state and again after every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Notification], usize) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let callback: Callback = Arc::new(callback);
        let list = self.snapshot();
        let unread = *self.unread.borrow();
        callback(&list, unread);
        self.subscribers.lock().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    fn notify_subscribers(&self) {
        // Callbacks may (un)subscribe, so run them outside the lock.
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        if callbacks.is_empty() {
            return;
        }
        let list = self.snapshot();
        let unread = *self.unread.borrow();
        for callback in callbacks {
            callback(&list, unread);
        }
    }
}
