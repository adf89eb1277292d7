use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::tokens::debit;
use super::Settings;
use crate::clock::Clock;
use crate::error::{GameError, GameResult};
use crate::models::{BoardLock, Player};
use crate::store::{DocKey, Store, Transaction, Write};

/// What a successful acquire hands back to the caller
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LockGrant {
    pub lock_until: DateTime<Utc>,
    pub tokens_remaining: u32,
}

/// Grants the exclusive, time-limited right to move, one token per grant
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    duration: Duration,
    min_moves_between_turns: Option<u32>,
}

impl LockManager {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            store,
            clock,
            duration: settings.lock_duration,
            min_moves_between_turns: settings.min_moves_between_turns,
        }
    }

    /// Lock the board for `player` and schedule its automatic release.
    ///
    /// Must be called from within an actix system, which runs the release timer.
    pub async fn acquire(&self, player: &Player) -> GameResult<LockGrant> {
        let grant = match self.try_acquire(player).await {
            Err(GameError::TransactionConflict) => return Err(self.explain_conflict(player).await),
            other => other?,
        };
        info!(
            "{} locked the board until {} ({} token(s) left)",
            player.name, grant.lock_until, grant.tokens_remaining
        );
        self.schedule_release(grant.lock_until);
        Ok(grant)
    }

    async fn try_acquire(&self, player: &Player) -> GameResult<LockGrant> {
        let game = self.store.game().await?;
        let mut state = game
            .value
            .ok_or_else(|| GameError::NotFound("game".to_string()))?;
        let user = self.store.user(&player.id).await?;
        let mut account = user
            .value
            .ok_or_else(|| GameError::NotFound(format!("user {}", player.id)))?;
        let now = self.clock.now();

        debit(&mut account, 1)?;

        if let Some(lock) = state.active_lock(now) {
            if lock.locked_by_user != player.id {
                return Err(GameError::AlreadyLocked {
                    holder: lock.locked_by_user_name.clone(),
                    until: lock.lock_until,
                });
            }
        }

        let mut txn = Transaction::new()
            .expect(DocKey::Game, game.version)
            .expect(DocKey::User(player.id.clone()), user.version);

        if let Some(required) = self.min_moves_between_turns {
            let counts = self.store.move_count().await?;
            if let Some(seen) = counts.value.since_last_move(&player.id) {
                if seen < required {
                    return Err(GameError::MustWait {
                        remaining: required - seen,
                    });
                }
            }
            txn = txn.expect(DocKey::MoveCount, counts.version);
        }

        let lock_until = now + self.chrono_duration();
        state.lock = Some(BoardLock {
            locked_by_user: player.id.clone(),
            locked_by_user_name: player.name.clone(),
            lock_until,
        });
        let tokens_remaining = account.tokens;

        self.store
            .commit(txn.write(Write::SetGame(state)).write(Write::SetUser(account)))
            .await?;

        Ok(LockGrant {
            lock_until,
            tokens_remaining,
        })
    }

    /// Someone else committed between our read and write; say who won if we can
    async fn explain_conflict(&self, player: &Player) -> GameError {
        let now = self.clock.now();
        match self.store.game().await {
            Ok(game) => match game.value.as_ref().and_then(|state| state.active_lock(now)) {
                Some(lock) if lock.locked_by_user != player.id => GameError::AlreadyLocked {
                    holder: lock.locked_by_user_name.clone(),
                    until: lock.lock_until,
                },
                _ => GameError::TransactionConflict,
            },
            Err(err) => err.into(),
        }
    }

    /// Clear the lock if `user_id` holds it or it has expired; returns whether anything changed
    pub async fn release(&self, user_id: &str) -> GameResult<bool> {
        let game = self.store.game().await?;
        let Some(mut state) = game.value else {
            return Ok(false);
        };
        let now = self.clock.now();

        match &state.lock {
            None => return Ok(false),
            Some(lock) if lock.locked_by_user != user_id && lock.lock_until > now => {
                warn!(
                    "{} tried to release a lock held by {}",
                    user_id, lock.locked_by_user
                );
                return Ok(false);
            }
            Some(_) => {}
        }

        state.lock = None;
        self.store
            .commit(
                Transaction::new()
                    .expect(DocKey::Game, game.version)
                    .write(Write::SetGame(state)),
            )
            .await?;
        info!("Lock released by {}", user_id);
        Ok(true)
    }

    /// Clear the lock only if it is still the one that expires at `lock_until`
    pub async fn release_if_current(&self, lock_until: DateTime<Utc>) -> GameResult<bool> {
        let game = self.store.game().await?;
        let Some(mut state) = game.value else {
            return Ok(false);
        };
        if state.lock.as_ref().map(|lock| lock.lock_until) != Some(lock_until) {
            return Ok(false);
        }

        state.lock = None;
        self.store
            .commit(
                Transaction::new()
                    .expect(DocKey::Game, game.version)
                    .write(Write::SetGame(state)),
            )
            .await?;
        Ok(true)
    }

    fn schedule_release(&self, lock_until: DateTime<Utc>) {
        let manager = self.clone();
        let delay = self.duration;
        actix_rt::spawn(async move {
            actix_rt::time::sleep(delay).await;
            match manager.release_if_current(lock_until).await {
                Ok(true) => info!("Auto-released lock that expired at {}", lock_until),
                Ok(false) => debug!("Lock expiring at {} was already gone", lock_until),
                Err(err) => warn!("Auto-release of lock expiring at {} failed: {}", lock_until, err),
            }
        });
    }

    fn chrono_duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.duration.as_millis() as i64)
    }
}
