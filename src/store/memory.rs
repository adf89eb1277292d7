//! In-process implementation of the store contract

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use log::{debug, error};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ChangeEvent, CommitReceipt, DocKey, Store, StoreResult, Transaction, Versioned, Write};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::{FinishedGame, GameState, MoveCount, MoveRecord, UserAccount};

#[derive(Default)]
struct Documents {
    game: Option<GameState>,
    move_count: MoveCount,
    ledger: Vec<MoveRecord>,
    users: HashMap<String, UserAccount>,
    archive: Vec<FinishedGame>,
    versions: HashMap<DocKey, u64>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Documents {
    fn version(&self, key: &DocKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn versioned<T>(&self, key: &DocKey, value: T) -> Versioned<T> {
        Versioned {
            version: self.version(key),
            value,
        }
    }

    /// Strictly increasing server timestamps for ledger entries
    fn next_stamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Serializable store kept behind a single mutex
pub struct MemoryStore {
    documents: Mutex<Documents>,
    subscribers: Mutex<Vec<UnboundedSender<ChangeEvent>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: Mutex::new(Documents::default()),
            subscribers: Mutex::new(Vec::new()),
            clock,
        }
    }

    fn documents(&self) -> StoreResult<MutexGuard<'_, Documents>> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("document lock poisoned".to_string()))
    }

    fn publish(&self, events: Vec<ChangeEvent>) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        for event in events {
            subscribers.retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn game(&self) -> StoreResult<Versioned<Option<GameState>>> {
        let docs = self.documents()?;
        Ok(docs.versioned(&DocKey::Game, docs.game.clone()))
    }

    async fn user(&self, user_id: &str) -> StoreResult<Versioned<Option<UserAccount>>> {
        let docs = self.documents()?;
        let key = DocKey::User(user_id.to_string());
        Ok(docs.versioned(&key, docs.users.get(user_id).cloned()))
    }

    async fn move_count(&self) -> StoreResult<Versioned<MoveCount>> {
        let docs = self.documents()?;
        Ok(docs.versioned(&DocKey::MoveCount, docs.move_count.clone()))
    }

    async fn ledger(&self) -> StoreResult<Versioned<Vec<MoveRecord>>> {
        let docs = self.documents()?;
        Ok(docs.versioned(&DocKey::Ledger, docs.ledger.clone()))
    }

    async fn ledger_len(&self) -> StoreResult<usize> {
        Ok(self.documents()?.ledger.len())
    }

    async fn moves_desc(&self, offset: usize, limit: usize) -> StoreResult<Vec<MoveRecord>> {
        let docs = self.documents()?;
        Ok(docs
            .ledger
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn finished_games(&self, limit: usize) -> StoreResult<Vec<FinishedGame>> {
        let docs = self.documents()?;
        let mut games = docs.archive.clone();
        games.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        games.truncate(limit);
        Ok(games)
    }

    async fn finished_game(&self, id: &str) -> StoreResult<Option<FinishedGame>> {
        let docs = self.documents()?;
        Ok(docs.archive.iter().find(|game| game.id == id).cloned())
    }

    async fn archive_count(&self) -> StoreResult<Versioned<u64>> {
        let docs = self.documents()?;
        Ok(docs.versioned(&DocKey::Archive, docs.archive.len() as u64))
    }

    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt> {
        let (preconditions, writes) = transaction.into_parts();
        let now = self.clock.now();
        let mut events = Vec::with_capacity(writes.len());
        let mut appended = Vec::new();

        {
            let mut docs = self.documents()?;
            for (key, expected) in &preconditions {
                let current = docs.version(key);
                if current != *expected {
                    debug!("Rejecting commit: {} at v{}, expected v{}", key, current, expected);
                    return Err(StoreError::Conflict(key.to_string()));
                }
            }

            let touched: HashSet<DocKey> = writes.iter().map(Write::key).collect();
            for write in writes {
                match write {
                    Write::SetGame(game) => {
                        docs.game = Some(game.clone());
                        events.push(ChangeEvent::GameChanged(game));
                    }
                    Write::SetMoveCount(counts) => {
                        docs.move_count = counts.clone();
                        events.push(ChangeEvent::MoveCountChanged(counts));
                    }
                    Write::SetUser(account) => {
                        let user_id = account.user_id.clone();
                        docs.users.insert(user_id.clone(), account);
                        events.push(ChangeEvent::UserChanged(user_id));
                    }
                    Write::AppendMove(pending) => {
                        let stamp = docs.next_stamp(now);
                        let record = pending.stamp(stamp);
                        docs.ledger.push(record.clone());
                        appended.push(record.clone());
                        events.push(ChangeEvent::MoveAppended(record));
                    }
                    Write::ClearLedger => {
                        docs.ledger.clear();
                        events.push(ChangeEvent::LedgerCleared);
                    }
                    Write::Archive(game) => {
                        docs.archive.push(game.clone());
                        events.push(ChangeEvent::GameArchived(game));
                    }
                }
            }
            for key in touched {
                *docs.versions.entry(key).or_insert(0) += 1;
            }
            // Still under the document lock, so the feed follows commit order
            self.publish(events);
        }

        Ok(CommitReceipt { appended })
    }

    fn subscribe(&self) -> UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = unbounded();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(_) => error!("Subscriber list poisoned; change feed closed"),
        }
        rx
    }
}
