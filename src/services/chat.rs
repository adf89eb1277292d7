use async_trait::async_trait;
use std::sync::Mutex;

use crate::models::ChatMessage;

/// Destination for system announcements such as game results
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Delivery is best effort; implementations log their own failures
    async fn announce(&self, message: ChatMessage);
}

/// Keeps every announcement in memory
#[derive(Default)]
pub struct RecordingAnnouncer {
    messages: Mutex<Vec<ChatMessage>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, message: ChatMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}
