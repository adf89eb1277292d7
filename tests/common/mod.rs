#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use futures::channel::mpsc::UnboundedReceiver;
use std::sync::Arc;
use std::time::Duration;

use globchess::clock::ManualClock;
use globchess::error::EvaluatorError;
use globchess::game::Evaluator;
use globchess::models::{
    FinishedGame, GameState, MoveCount, MoveRecord, MoveRequest, Player, UserAccount,
};
use globchess::services::{GameService, RecordingAnnouncer, Settings};
use globchess::store::{
    ChangeEvent, CommitReceipt, MemoryStore, Store, StoreResult, Transaction, Versioned,
};

/// Scores every position the same, so every ordinary move earns 100
pub struct FlatEvaluator;

#[async_trait]
impl Evaluator for FlatEvaluator {
    async fn evaluate(&self, _fen: &str) -> Result<f64, EvaluatorError> {
        Ok(0.3)
    }
}

/// Yields for a while before answering, letting concurrent commits interleave
pub struct SlowEvaluator(pub Duration);

#[async_trait]
impl Evaluator for SlowEvaluator {
    async fn evaluate(&self, _fen: &str) -> Result<f64, EvaluatorError> {
        actix_rt::time::sleep(self.0).await;
        Ok(0.0)
    }
}

/// Moves the clock forward on every call, as a slow engine would
pub struct ClockAdvancingEvaluator {
    pub clock: Arc<ManualClock>,
    pub step: ChronoDuration,
}

#[async_trait]
impl Evaluator for ClockAdvancingEvaluator {
    async fn evaluate(&self, _fen: &str) -> Result<f64, EvaluatorError> {
        self.clock.advance(self.step);
        Ok(0.0)
    }
}

/// Waits before every commit so concurrent callers all read before anyone writes
pub struct DelayedCommits {
    inner: Arc<MemoryStore>,
    pause: Duration,
}

#[async_trait]
impl Store for DelayedCommits {
    async fn game(&self) -> StoreResult<Versioned<Option<GameState>>> {
        self.inner.game().await
    }

    async fn user(&self, user_id: &str) -> StoreResult<Versioned<Option<UserAccount>>> {
        self.inner.user(user_id).await
    }

    async fn move_count(&self) -> StoreResult<Versioned<MoveCount>> {
        self.inner.move_count().await
    }

    async fn ledger(&self) -> StoreResult<Versioned<Vec<MoveRecord>>> {
        self.inner.ledger().await
    }

    async fn ledger_len(&self) -> StoreResult<usize> {
        self.inner.ledger_len().await
    }

    async fn moves_desc(&self, offset: usize, limit: usize) -> StoreResult<Vec<MoveRecord>> {
        self.inner.moves_desc(offset, limit).await
    }

    async fn finished_games(&self, limit: usize) -> StoreResult<Vec<FinishedGame>> {
        self.inner.finished_games(limit).await
    }

    async fn finished_game(&self, id: &str) -> StoreResult<Option<FinishedGame>> {
        self.inner.finished_game(id).await
    }

    async fn archive_count(&self) -> StoreResult<Versioned<u64>> {
        self.inner.archive_count().await
    }

    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt> {
        actix_rt::time::sleep(self.pause).await;
        self.inner.commit(transaction).await
    }

    fn subscribe(&self) -> UnboundedReceiver<ChangeEvent> {
        self.inner.subscribe()
    }
}

pub struct Harness {
    pub service: GameService,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub announcer: Arc<RecordingAnnouncer>,
}

impl Harness {
    pub async fn new(settings: Settings) -> Self {
        Self::with_evaluator(settings, Arc::new(FlatEvaluator)).await
    }

    pub async fn with_evaluator(settings: Settings, evaluator: Arc<dyn Evaluator>) -> Self {
        Self::build(settings, Arc::new(ManualClock::default()), evaluator, None).await
    }

    /// Every evaluation pushes the clock forward by `step`
    pub async fn with_advancing_clock(settings: Settings, step: ChronoDuration) -> Self {
        let clock = Arc::new(ManualClock::default());
        let evaluator = Arc::new(ClockAdvancingEvaluator {
            clock: clock.clone(),
            step,
        });
        Self::build(settings, clock, evaluator, None).await
    }

    /// The service's commits wait `pause` before reaching the store
    pub async fn with_commit_delay(settings: Settings, pause: Duration) -> Self {
        Self::build(
            settings,
            Arc::new(ManualClock::default()),
            Arc::new(FlatEvaluator),
            Some(pause),
        )
        .await
    }

    async fn build(
        settings: Settings,
        clock: Arc<ManualClock>,
        evaluator: Arc<dyn Evaluator>,
        commit_delay: Option<Duration>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let backing: Arc<dyn Store> = match commit_delay {
            Some(pause) => Arc::new(DelayedCommits {
                inner: store.clone(),
                pause,
            }),
            None => store.clone(),
        };
        let announcer = Arc::new(RecordingAnnouncer::new());
        let service = GameService::new(
            backing,
            clock.clone(),
            evaluator,
            announcer.clone(),
            settings,
        );
        service.bootstrap().await.unwrap();
        Self {
            service,
            store,
            clock,
            announcer,
        }
    }

    /// A player whose account holds `tokens`
    pub async fn player(&self, id: &str, name: &str, tokens: u32) -> Player {
        self.service.credit_tokens(id, tokens).await.unwrap();
        Player::new(id, name)
    }

    /// Lock the board and play one move
    pub async fn play(&self, player: &Player, from: &str, to: &str) -> globchess::services::CommittedMove {
        self.service.acquire_lock(player).await.unwrap();
        self.service
            .commit_move(player, &request(from, to))
            .await
            .unwrap()
    }
}

pub fn request(from: &str, to: &str) -> MoveRequest {
    MoveRequest {
        from: from.to_string(),
        to: to.to_string(),
        promotion: None,
    }
}
