pub mod handler;
pub mod hub;

pub use handler::{ws_index, LiveSession};
pub use hub::{spawn_relay, Hub, HubAnnouncer};
