//! Transient user-facing notifications ("toasts").

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// How long a notification stays visible once raised.
pub const NOTIFICATION_TTL_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.raised_at >= Duration::seconds(NOTIFICATION_TTL_SECS)
    }
}

/// Bounded FIFO; when full the oldest notification is dropped.
#[derive(Debug)]
pub struct NotificationQueue {
    capacity: usize,
    entries: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(notification);
    }

    /// Most recent notification that has not expired yet.
    pub fn latest(&self, now: DateTime<Utc>) -> Option<&Notification> {
        self.entries
            .back()
            .filter(|notification| !notification.is_expired(now))
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
