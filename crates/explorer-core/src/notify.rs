//! Transient user notifications

use crate::error::ExplorerError;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One notification shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inbox {
    next_id: u64,
    items: Vec<Notification>,
}

/// Dismissible notifications that expire after a fixed lifetime.
///
/// Pushing a message identical to one still active returns the existing id
/// instead of showing it twice.
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    inbox: Mutex<Inbox>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inbox: Mutex::new(Inbox::default()),
        }
    }

    pub fn push(&self, severity: Severity, message: impl Into<String>) -> u64 {
        let message = message.into();
        let now = Instant::now();
        let mut inbox = self.inbox.lock();
        inbox.items.retain(|n| n.expires_at > now);

        if let Some(existing) = inbox
            .items
            .iter_mut()
            .find(|n| n.severity == severity && n.message == message)
        {
            existing.expires_at = now + self.ttl;
            return existing.id;
        }

        inbox.next_id += 1;
        let id = inbox.next_id;
        match severity {
            Severity::Error => tracing::warn!("notify[{}]: {}", id, message),
            _ => tracing::debug!("notify[{}]: {}", id, message),
        }
        inbox.items.push(Notification {
            id,
            severity,
            message,
            expires_at: now + self.ttl,
        });
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(Severity::Success, message)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(Severity::Info, message)
    }

    /// Error notification carrying the user-facing text of `error`
    pub fn error(&self, error: &ExplorerError) -> u64 {
        self.push(Severity::Error, error.user_message())
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let mut inbox = self.inbox.lock();
        let before = inbox.items.len();
        inbox.items.retain(|n| n.id != id);
        inbox.items.len() != before
    }

    /// Notifications that have not expired or been dismissed, oldest first
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut inbox = self.inbox.lock();
        inbox.items.retain(|n| n.expires_at > now);
        inbox.items.clone()
    }

    pub fn clear(&self) {
        self.inbox.lock().items.clear();
    }
}
