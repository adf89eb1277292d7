//! Operations on the shared board, built over a [`Store`] and a [`Clock`]

use futures::channel::mpsc::UnboundedReceiver;
use log::info;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{GameError, GameResult};
use crate::game::{
    color_to_string, status_label, AccuracyScorer, CandidateMove, Evaluator, Position,
};
use crate::models::{
    FinishedGame, FinishedGameSummary, GameState, MoveCount, MoveRequest, Player, UserAccount,
};
use crate::store::{ChangeEvent, Store};

pub mod chat;
pub mod ledger;
pub mod lifecycle;
pub mod lock;
pub mod moves;
pub mod tokens;

pub use chat::{Announcer, RecordingAnnouncer};
pub use ledger::{MoveLedger, MovePage, PAGE_SIZE};
pub use lifecycle::GameLifecycle;
pub use lock::{LockGrant, LockManager};
pub use moves::{CommittedMove, MoveCommitter};
pub use tokens::TokenLedger;

/// Tunables for the lock and fairness rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub lock_duration: Duration,
    pub min_moves_between_turns: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lock_duration: Duration::from_secs(60),
            min_moves_between_turns: None,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            lock_duration: config.lock_duration(),
            min_moves_between_turns: config.min_moves_between_turns(),
        }
    }
}

/// The board as clients see it
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub game: GameState,
    pub status: String,
    pub side_to_move: String,
    pub locked: bool,
    pub total_moves: usize,
    pub move_count: MoveCount,
}

#[derive(Clone)]
pub struct GameService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    locks: LockManager,
    moves: MoveCommitter,
    ledger: MoveLedger,
    lifecycle: GameLifecycle,
    tokens: TokenLedger,
}

impl GameService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        evaluator: Arc<dyn Evaluator>,
        announcer: Arc<dyn Announcer>,
        settings: Settings,
    ) -> Self {
        let lifecycle = GameLifecycle::new(store.clone(), clock.clone(), announcer);
        Self {
            locks: LockManager::new(store.clone(), clock.clone(), &settings),
            moves: MoveCommitter::new(
                store.clone(),
                clock.clone(),
                AccuracyScorer::new(evaluator),
                lifecycle.clone(),
            ),
            ledger: MoveLedger::new(store.clone()),
            tokens: TokenLedger::new(store.clone()),
            lifecycle,
            store,
            clock,
        }
    }

    /// Make sure a game exists and archive one left finished by an earlier run
    pub async fn bootstrap(&self) -> GameResult<GameState> {
        self.lifecycle.ensure_game().await?;
        if let Some(finished) = self.lifecycle.complete_if_terminal().await? {
            info!("Archived game #{} left over from a previous run", finished.game_number);
        }
        self.lifecycle.ensure_game().await
    }

    pub async fn game_view(&self) -> GameResult<GameView> {
        let game = self.lifecycle.ensure_game().await?;
        let position = Position::from_fen(&game.fen)?;
        let move_count = self.store.move_count().await?.value;
        Ok(GameView {
            status: status_label(&position).to_string(),
            side_to_move: color_to_string(position.side_to_move()),
            locked: game.active_lock(self.clock.now()).is_some(),
            total_moves: self.ledger.len().await?,
            move_count,
            game,
        })
    }

    /// Archive a finished board first so nobody pays a token to play on it
    pub async fn acquire_lock(&self, player: &Player) -> GameResult<LockGrant> {
        self.lifecycle.complete_if_terminal().await?;
        self.locks.acquire(player).await
    }

    pub async fn release_lock(&self, player: &Player) -> GameResult<bool> {
        self.locks.release(&player.id).await
    }

    pub async fn propose_move(&self, request: &MoveRequest) -> GameResult<CandidateMove> {
        self.moves.propose(request).await
    }

    pub async fn commit_move(
        &self,
        player: &Player,
        request: &MoveRequest,
    ) -> GameResult<CommittedMove> {
        self.moves.commit(player, request).await
    }

    pub async fn legal_destinations(&self, from: &str) -> GameResult<Vec<String>> {
        let game = self.lifecycle.ensure_game().await?;
        Position::from_fen(&game.fen)?.legal_destinations(from)
    }

    pub async fn move_page(&self, page: usize) -> GameResult<MovePage> {
        self.ledger.page(page).await
    }

    pub async fn account(&self, user_id: &str) -> GameResult<UserAccount> {
        self.store
            .user(user_id)
            .await?
            .value
            .ok_or_else(|| GameError::NotFound(format!("user {}", user_id)))
    }

    pub async fn credit_tokens(&self, user_id: &str, amount: u32) -> GameResult<u32> {
        self.tokens.credit(user_id, amount).await
    }

    pub async fn finished_games(&self, limit: usize) -> GameResult<Vec<FinishedGameSummary>> {
        let games = self.store.finished_games(limit).await?;
        Ok(games.iter().map(FinishedGameSummary::from).collect())
    }

    pub async fn finished_game(&self, id: &str) -> GameResult<FinishedGame> {
        self.store
            .finished_game(id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("game {}", id)))
    }

    /// Feed of committed changes for live clients
    pub fn subscribe(&self) -> UnboundedReceiver<ChangeEvent> {
        self.store.subscribe()
    }

    pub fn lifecycle(&self) -> &GameLifecycle {
        &self.lifecycle
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }
}
