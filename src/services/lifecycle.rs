use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::chat::Announcer;
use crate::clock::Clock;
use crate::error::{GameError, GameResult};
use crate::game::{position_outcome, GameHistory, Outcome, Position};
use crate::models::{
    ArchiveStatus, ChatMessage, FinishedGame, GameState, MoveCount, MoveRecord,
};
use crate::store::{DocKey, Store, Transaction, Write};

const SYSTEM_SENDER: &str = "System";

/// Rebuild the game's history from its ledger, if the ledger leads to the stored board
pub(crate) fn history_for(state: &GameState, ledger: &[MoveRecord]) -> Option<GameHistory> {
    match GameHistory::replay(ledger.iter().map(|record| record.san.as_str())) {
        Ok(history) if history.position().fen() == state.fen => Some(history),
        Ok(_) => {
            warn!("Ledger does not lead to the stored board; ignoring repetitions");
            None
        }
        Err(err) => {
            warn!("Ledger replay failed: {}", err);
            None
        }
    }
}

/// Terminal outcome of the stored game, using the ledger for repetition when possible
pub(crate) fn judge(state: &GameState, ledger: &[MoveRecord]) -> GameResult<Option<Outcome>> {
    match history_for(state, ledger) {
        Some(history) => Ok(history.outcome()),
        None => Ok(position_outcome(&Position::from_fen(&state.fen)?)),
    }
}

/// Detects finished games, archives them and starts the next one
#[derive(Clone)]
pub struct GameLifecycle {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    announcer: Arc<dyn Announcer>,
}

impl GameLifecycle {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, announcer: Arc<dyn Announcer>) -> Self {
        Self {
            store,
            clock,
            announcer,
        }
    }

    /// Return the current game, creating a fresh one if none exists
    pub async fn ensure_game(&self) -> GameResult<GameState> {
        let game = self.store.game().await?;
        if let Some(state) = game.value {
            return Ok(state);
        }

        let fresh = GameState::new();
        let created = self
            .store
            .commit(
                Transaction::new()
                    .expect(DocKey::Game, game.version)
                    .write(Write::SetGame(fresh.clone()))
                    .write(Write::SetMoveCount(MoveCount::new())),
            )
            .await;

        match created {
            Ok(_) => {
                info!("Started a new game");
                Ok(fresh)
            }
            Err(err) => {
                debug!("Game creation raced: {}", err);
                self.store
                    .game()
                    .await?
                    .value
                    .ok_or_else(|| GameError::NotFound("game".to_string()))
            }
        }
    }

    /// Archive the stored game if it has already ended
    pub async fn complete_if_terminal(&self) -> GameResult<Option<FinishedGame>> {
        let Some(state) = self.store.game().await?.value else {
            return Ok(None);
        };
        let ledger = self.store.ledger().await?;
        if judge(&state, &ledger.value)?.is_none() {
            return Ok(None);
        }
        self.archive(&state.fen).await
    }

    /// Archive the game that ended at `observed_fen` and reset the board.
    ///
    /// Returns `None` when the board has already moved on, so repeated triggers
    /// for the same ending archive it once.
    pub async fn archive(&self, observed_fen: &str) -> GameResult<Option<FinishedGame>> {
        let game = self.store.game().await?;
        let Some(state) = game.value else {
            return Ok(None);
        };
        if state.fen != observed_fen {
            debug!("Game ending at {} was already archived", observed_fen);
            return Ok(None);
        }

        let ledger = self.store.ledger().await?;
        let Some(outcome) = judge(&state, &ledger.value)? else {
            warn!("Refusing to archive a game still in progress: {}", state.fen);
            return Ok(None);
        };
        let archived = self.store.archive_count().await?;
        let now = self.clock.now();

        let finished = FinishedGame {
            id: Uuid::new_v4().to_string(),
            game_number: archived.value + 1,
            fen: state.fen.clone(),
            moves: ledger.value,
            ended_at: now,
            last_move_by: state.last_move.map(|last| last.player_handle),
            result: outcome.result(),
            status: ArchiveStatus::Completed,
        };

        let committed = self
            .store
            .commit(
                Transaction::new()
                    .expect(DocKey::Game, game.version)
                    .expect(DocKey::Ledger, ledger.version)
                    .expect(DocKey::Archive, archived.version)
                    .write(Write::Archive(finished.clone()))
                    .write(Write::ClearLedger)
                    .write(Write::SetGame(GameState::new()))
                    .write(Write::SetMoveCount(MoveCount::new())),
            )
            .await;

        if let Err(err) = committed {
            let current = self.store.game().await?.value;
            if current.map(|state| state.fen) != Some(observed_fen.to_string()) {
                debug!("Another archiver finished game ending at {}", observed_fen);
                return Ok(None);
            }
            return Err(err.into());
        }

        info!(
            "Game #{} archived as {} after {} move(s)",
            finished.game_number,
            finished.result,
            finished.moves.len()
        );
        self.announcer
            .announce(ChatMessage {
                content: format!(
                    "Game #{} has ended. Result: {}",
                    finished.game_number, finished.result
                ),
                player_name: SYSTEM_SENDER.to_string(),
                game_number: finished.game_number,
                timestamp: now,
            })
            .await;

        Ok(Some(finished))
    }
}
