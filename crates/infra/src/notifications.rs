//! Outbound notification port.
//!
//! Delivery (SMTP, chat, paging) is a deployment concern; the allocation
//! service only needs "send this message to that address".

use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

pub trait Notifications: Send + Sync {
    fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub destination: String,
    pub message: String,
}

/// Records every notification instead of delivering it.
#[derive(Debug, Default)]
pub struct InMemoryNotifications {
    sent: Mutex<Vec<SentNotification>>,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifications for InMemoryNotifications {
    fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Unavailable("lock poisoned".to_string()))?;
        sent.push(SentNotification {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
