use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::STARTING_FEN;

/// The single shared board every participant plays on
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub fen: String,
    pub last_move: Option<LastMove>,
    /// Present only while someone holds (or held, until cleared) the write lock
    pub lock: Option<BoardLock>,
}

/// Exclusive right to commit the next move
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardLock {
    pub locked_by_user: String,
    pub locked_by_user_name: String,
    pub lock_until: DateTime<Utc>,
}

/// Copy of the most recent move, mirrored from the ledger
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
    pub player_handle: String,
    pub san: String,
    pub accuracy: f64,
}

impl GameState {
    /// A fresh game at the initial position with no lock
    pub fn new() -> Self {
        Self {
            fen: STARTING_FEN.to_string(),
            last_move: None,
            lock: None,
        }
    }

    /// The lock, if it has not yet expired at `now`
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<&BoardLock> {
        self.lock.as_ref().filter(|lock| lock.lock_until > now)
    }

    pub fn is_locked_by(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        self.active_lock(now)
            .map(|lock| lock.locked_by_user == user_id)
            .unwrap_or(false)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expired_lock_is_not_active() {
        let now = Utc::now();
        let mut state = GameState::new();
        state.lock = Some(BoardLock {
            locked_by_user: "u1".to_string(),
            locked_by_user_name: "Ann".to_string(),
            lock_until: now + Duration::seconds(5),
        });

        assert!(state.is_locked_by("u1", now));
        assert!(!state.is_locked_by("u2", now));
        assert!(state.active_lock(now + Duration::seconds(5)).is_none());
    }
}
