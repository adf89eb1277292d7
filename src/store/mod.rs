//! Contract for the transactional document store the core runs against.
//!
//! Every document carries a version. A [`Transaction`] lists the versions it
//! read and the writes it wants; the store applies all writes atomically or
//! none, failing with [`StoreError::Conflict`] if any read went stale.

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use std::fmt;

use crate::error::StoreError;
use crate::models::{FinishedGame, GameState, MoveCount, MoveRecord, NewMove, UserAccount};

pub mod memory;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Addressable documents; absent documents have version 0
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocKey {
    Game,
    MoveCount,
    Ledger,
    Archive,
    User(String),
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::Game => f.write_str("game"),
            DocKey::MoveCount => f.write_str("moveCount"),
            DocKey::Ledger => f.write_str("moves"),
            DocKey::Archive => f.write_str("games"),
            DocKey::User(id) => write!(f, "users/{}", id),
        }
    }
}

/// A value together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[derive(Debug, Clone)]
pub enum Write {
    SetGame(GameState),
    SetMoveCount(MoveCount),
    SetUser(UserAccount),
    /// The store assigns the timestamp
    AppendMove(NewMove),
    ClearLedger,
    Archive(FinishedGame),
}

impl Write {
    pub fn key(&self) -> DocKey {
        match self {
            Write::SetGame(_) => DocKey::Game,
            Write::SetMoveCount(_) => DocKey::MoveCount,
            Write::SetUser(account) => DocKey::User(account.user_id.clone()),
            Write::AppendMove(_) | Write::ClearLedger => DocKey::Ledger,
            Write::Archive(_) => DocKey::Archive,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transaction {
    preconditions: Vec<(DocKey, u64)>,
    writes: Vec<Write>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to still be at `version` when the transaction commits
    pub fn expect(mut self, key: DocKey, version: u64) -> Self {
        self.preconditions.push((key, version));
        self
    }

    pub fn write(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    pub fn into_parts(self) -> (Vec<(DocKey, u64)>, Vec<Write>) {
        (self.preconditions, self.writes)
    }
}

/// What a successful commit produced
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub appended: Vec<MoveRecord>,
}

/// Change notification emitted after every successful commit
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    GameChanged(GameState),
    MoveAppended(MoveRecord),
    LedgerCleared,
    MoveCountChanged(MoveCount),
    UserChanged(String),
    GameArchived(FinishedGame),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn game(&self) -> StoreResult<Versioned<Option<GameState>>>;

    async fn user(&self, user_id: &str) -> StoreResult<Versioned<Option<UserAccount>>>;

    async fn move_count(&self) -> StoreResult<Versioned<MoveCount>>;

    /// The whole ledger in insertion order
    async fn ledger(&self) -> StoreResult<Versioned<Vec<MoveRecord>>>;

    async fn ledger_len(&self) -> StoreResult<usize>;

    /// Newest-first slice of the ledger
    async fn moves_desc(&self, offset: usize, limit: usize) -> StoreResult<Vec<MoveRecord>>;

    /// Newest-first archived games
    async fn finished_games(&self, limit: usize) -> StoreResult<Vec<FinishedGame>>;

    async fn finished_game(&self, id: &str) -> StoreResult<Option<FinishedGame>>;

    async fn archive_count(&self) -> StoreResult<Versioned<u64>>;

    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt>;

    fn subscribe(&self) -> UnboundedReceiver<ChangeEvent>;
}
