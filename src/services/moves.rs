use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::lifecycle::{history_for, GameLifecycle};
use crate::clock::Clock;
use crate::error::{GameError, GameResult, StoreError};
use crate::game::{
    position_outcome, propose_move, AccuracyScorer, CandidateMove, Outcome, Played, Position,
};
use crate::models::{
    FinishedGame, GameResult as FinalResult, GameState, LastMove, MoveCount, MoveRecord,
    MoveRequest, MoveSnapshot, NewMove, Player, UserAccount,
};
use crate::store::{CommitReceipt, DocKey, Store, StoreResult, Transaction, Write};

/// Everything a successful commit produced
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommittedMove {
    pub san: String,
    pub fen: String,
    pub accuracy: f64,
    pub record: MoveRecord,
    pub result: Option<FinalResult>,
    /// Set when this move ended the game and this call archived it
    pub finished_game: Option<FinishedGame>,
}

/// Reads taken before scoring; their versions guard the final write
struct PreparedMove {
    game_version: u64,
    ledger_version: u64,
    counts_version: u64,
    user_version: u64,
    counts: MoveCount,
    account: UserAccount,
    request: MoveRequest,
    game: GameState,
    san: String,
    played: Played,
    outcome: Option<Outcome>,
}

/// Validates, scores and persists moves made under the board lock
#[derive(Clone)]
pub struct MoveCommitter {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    scorer: AccuracyScorer,
    lifecycle: GameLifecycle,
}

impl MoveCommitter {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        scorer: AccuracyScorer,
        lifecycle: GameLifecycle,
    ) -> Self {
        Self {
            store,
            clock,
            scorer,
            lifecycle,
        }
    }

    /// Check a move against the current board without persisting anything
    pub async fn propose(&self, request: &MoveRequest) -> GameResult<CandidateMove> {
        let state = self.current_game().await?;
        propose_move(
            &state.fen,
            &request.from,
            &request.to,
            request.promotion.as_deref(),
        )
    }

    /// Re-validate and persist a move for the lock holder.
    ///
    /// The board, ledger, move counts and the mover's account are written in
    /// one transaction. A move that ends the game also archives it.
    pub async fn commit(&self, player: &Player, request: &MoveRequest) -> GameResult<CommittedMove> {
        let prepared = self.prepare(player, request).await?;
        let fen_after = prepared.played.position.fen();
        let accuracy = self
            .scorer
            .score_transition(&prepared.game.fen, &fen_after, prepared.outcome)
            .await;

        // Scoring can outlast the lock; the game version pins the lock we check here
        if !prepared.game.is_locked_by(&player.id, self.clock.now()) {
            warn!("Lock of {} expired while {} was being scored", player.name, prepared.san);
            return Err(GameError::NotLockHolder);
        }

        let outcome = prepared.outcome;
        let san = prepared.san.clone();
        let receipt = match self.write(player, prepared, accuracy).await {
            Ok(receipt) => receipt,
            Err(StoreError::Conflict(key)) => {
                warn!("Move by {} lost a race on {}", player.name, key);
                return Err(self.explain_conflict(player).await);
            }
            Err(err) => return Err(err.into()),
        };
        let record = receipt
            .appended
            .into_iter()
            .next()
            .ok_or_else(|| GameError::Store("ledger append was not recorded".to_string()))?;

        info!(
            "{} played {} (accuracy {}), board now {}",
            player.name, san, accuracy, fen_after
        );

        let finished_game = match outcome {
            Some(_) => match self.lifecycle.archive(&fen_after).await {
                Ok(finished) => finished,
                Err(err) => {
                    warn!("Archival after {} deferred: {}", san, err);
                    None
                }
            },
            None => None,
        };

        Ok(CommittedMove {
            san,
            fen: fen_after,
            accuracy,
            record,
            result: outcome.map(|outcome| outcome.result()),
            finished_game,
        })
    }

    async fn prepare(&self, player: &Player, request: &MoveRequest) -> GameResult<PreparedMove> {
        let game = self.store.game().await?;
        let state = game
            .value
            .ok_or_else(|| GameError::NotFound("game".to_string()))?;
        if !state.is_locked_by(&player.id, self.clock.now()) {
            return Err(GameError::NotLockHolder);
        }

        let ledger = self.store.ledger().await?;
        let history = history_for(&state, &ledger.value);
        let position = match &history {
            Some(history) => *history.position(),
            None => Position::from_fen(&state.fen)?,
        };

        let played = position.play(&request.from, &request.to).map_err(|err| match err {
            GameError::IllegalMove(reason) => GameError::InvalidMove(reason),
            other => other,
        })?;
        let san = position.san(played.chess_move);
        let outcome = match history {
            Some(mut history) => {
                history.push(played);
                history.outcome()
            }
            None => position_outcome(&played.position),
        };

        let counts = self.store.move_count().await?;
        let user = self.store.user(&player.id).await?;
        let mut account = user
            .value
            .unwrap_or_else(|| UserAccount::new(player.id.clone(), player.name.clone()));
        account.name = player.name.clone();

        Ok(PreparedMove {
            game_version: game.version,
            ledger_version: ledger.version,
            counts_version: counts.version,
            user_version: user.version,
            counts: counts.value,
            account,
            request: request.clone(),
            game: state,
            san,
            played,
            outcome,
        })
    }

    async fn write(
        &self,
        player: &Player,
        prepared: PreparedMove,
        accuracy: f64,
    ) -> StoreResult<CommitReceipt> {
        let PreparedMove {
            game_version,
            ledger_version,
            counts_version,
            user_version,
            mut counts,
            mut account,
            request,
            san,
            played,
            ..
        } = prepared;
        let fen = played.position.fen();

        account.record_move(MoveSnapshot {
            from: request.from.clone(),
            to: request.to.clone(),
            san: san.clone(),
            accuracy,
            game_fen: fen.clone(),
            timestamp: self.clock.now(),
        });
        counts.record_move(&player.id);

        let state = GameState {
            fen,
            last_move: Some(LastMove {
                from: request.from,
                to: request.to,
                promotion: played
                    .chess_move
                    .get_promotion()
                    .map(|_| "q".to_string()),
                player_handle: player.name.clone(),
                san: san.clone(),
                accuracy,
            }),
            lock: None,
        };

        self.store
            .commit(
                Transaction::new()
                    .expect(DocKey::Game, game_version)
                    .expect(DocKey::Ledger, ledger_version)
                    .expect(DocKey::MoveCount, counts_version)
                    .expect(DocKey::User(player.id.clone()), user_version)
                    .write(Write::SetGame(state))
                    .write(Write::AppendMove(NewMove {
                        san,
                        player_handle: player.name.clone(),
                        accuracy,
                    }))
                    .write(Write::SetUser(account))
                    .write(Write::SetMoveCount(counts)),
            )
            .await
    }

    async fn explain_conflict(&self, player: &Player) -> GameError {
        match self.store.game().await {
            Ok(game) => match game.value {
                Some(state) if state.is_locked_by(&player.id, self.clock.now()) => {
                    GameError::TransactionConflict
                }
                _ => GameError::NotLockHolder,
            },
            Err(err) => err.into(),
        }
    }

    async fn current_game(&self) -> GameResult<GameState> {
        self.store
            .game()
            .await?
            .value
            .ok_or_else(|| GameError::NotFound("game".to_string()))
    }
}
