//! Toast-style notifications raised by session operations
//!
//! The session manager never returns UI; it pushes notifications here and the
//! presentation layer drains or renders them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maximum number of notifications to keep at once
const MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Success,
    Error,
    Warning,
    Info,
}

/// A single user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationType::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationType::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationType::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationType::Info, title, message)
    }
}

/// Notification item with unique ID for tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationItem {
    pub id: u64,
    pub notification: Notification,
}

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<NotificationItem>,
    next_id: u64,
}

/// Bounded notification queue. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct NotificationCenter {
    inner: Arc<Mutex<Inner>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a notification, returning its id
    pub fn notify(&self, notification: Notification) -> u64 {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        inner.items.push_back(NotificationItem { id, notification });

        // Remove oldest if we exceed max
        while inner.items.len() > MAX_NOTIFICATIONS {
            inner.items.pop_front();
        }

        id
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.notify(Notification::success(title, message))
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.notify(Notification::error(title, message))
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.notify(Notification::warning(title, message))
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.notify(Notification::info(title, message))
    }

    /// Remove one notification; false if it was already gone
    pub fn dismiss(&self, id: u64) -> bool {
        let mut inner = self.lock();
        let before = inner.items.len();
        inner.items.retain(|item| item.id != id);
        inner.items.len() != before
    }

    /// Clear all notifications
    pub fn clear(&self) {
        self.lock().items.clear();
    }

    /// Current notifications, oldest first
    pub fn items(&self) -> Vec<NotificationItem> {
        self.lock().items.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.lock()
            .items
            .back()
            .map(|item| item.notification.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}
