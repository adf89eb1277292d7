use actix::Addr;
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::handler::LiveSession;
use crate::models::{ChatMessage, LiveMessage, ServerMessage};
use crate::services::Announcer;
use crate::store::ChangeEvent;

/// Connected live sessions, keyed by connection id
#[derive(Default)]
pub struct Hub {
    sessions: Mutex<HashMap<String, Addr<LiveSession>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, id: &str, addr: Addr<LiveSession>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id.to_string(), addr);
            info!("Session {} joined, {} active", id, sessions.len());
        }
    }

    pub fn leave(&self, id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(id);
            info!("Session {} left, {} active", id, sessions.len());
        }
    }

    pub fn broadcast(&self, message: &ServerMessage) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(err) => {
                warn!("Error serializing {} message: {}", message.message_type, err);
                return;
            }
        };

        let recipients: Vec<Addr<LiveSession>> = match self.sessions.lock() {
            Ok(sessions) => sessions.values().cloned().collect(),
            Err(_) => {
                warn!("Session registry poisoned; dropping {}", message.message_type);
                return;
            }
        };
        debug!(
            "Broadcasting {} to {} session(s)",
            message.message_type,
            recipients.len()
        );
        for addr in recipients {
            addr.do_send(LiveMessage(text.clone()));
        }
    }
}

/// Push every committed change to connected sessions until the feed closes
pub fn spawn_relay(hub: Arc<Hub>, mut feed: UnboundedReceiver<ChangeEvent>) {
    actix_rt::spawn(async move {
        while let Some(event) = feed.next().await {
            if let Some(message) = ServerMessage::from_change(event) {
                hub.broadcast(&message);
            }
        }
        info!("Change feed closed; relay stopped");
    });
}

/// Posts announcements into every live session's chat
pub struct HubAnnouncer {
    hub: Arc<Hub>,
}

impl HubAnnouncer {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Announcer for HubAnnouncer {
    async fn announce(&self, message: ChatMessage) {
        info!("[{}] {}", message.player_name, message.content);
        self.hub.broadcast(&ServerMessage::chat(message));
    }
}
