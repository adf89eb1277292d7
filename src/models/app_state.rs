use std::sync::Arc;

use crate::config::Config;
use crate::services::GameService;
use crate::websocket::Hub;

/// Application state shared between workers and connections
pub struct AppState {
    pub service: GameService,
    pub hub: Arc<Hub>,
    /// Shared secret the payment collaborator must present; credits are open when unset
    pub credit_secret: Option<String>,
    /// Attempts per request when a transaction conflicts
    pub max_attempts: u32,
}

impl AppState {
    pub fn new(service: GameService, hub: Arc<Hub>, config: &Config) -> Self {
        Self {
            service,
            hub,
            credit_secret: config.tokens.credit_secret.clone(),
            max_attempts: config.transport.max_attempts.max(1),
        }
    }
}
