use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::GameResult as Result;
use crate::game::Position;

/// Identity supplied by the authentication collaborator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A committed move as stored in the ledger
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub san: String,
    pub player_handle: String,
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
}

/// A move waiting for the store to assign its timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewMove {
    pub san: String,
    pub player_handle: String,
    pub accuracy: f64,
}

impl NewMove {
    pub fn stamp(self, timestamp: DateTime<Utc>) -> MoveRecord {
        MoveRecord {
            san: self.san,
            player_handle: self.player_handle,
            timestamp,
            accuracy: self.accuracy,
        }
    }
}

/// Moves made by others since each user's own last move
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct MoveCount(BTreeMap<String, u32>);

impl MoveCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since_last_move(&self, user_id: &str) -> Option<u32> {
        self.0.get(user_id).copied()
    }

    /// Reset the mover to zero and bump everyone else
    pub fn record_move(&mut self, mover: &str) {
        for (user, count) in self.0.iter_mut() {
            if user == mover {
                *count = 0;
            } else {
                *count += 1;
            }
        }
        self.0.entry(mover.to_string()).or_insert(0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One entry in a user's personal move history
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveSnapshot {
    pub from: String,
    pub to: String,
    pub san: String,
    pub accuracy: f64,
    pub game_fen: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub user_id: String,
    pub name: String,
    pub tokens: u32,
    pub total_moves: u32,
    pub total_accuracy: f64,
    pub average_accuracy: f64,
    pub moves: Vec<MoveSnapshot>,
}

impl UserAccount {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            tokens: 0,
            total_moves: 0,
            total_accuracy: 0.0,
            average_accuracy: 0.0,
            moves: Vec::new(),
        }
    }

    /// Fold a committed move into the running statistics
    pub fn record_move(&mut self, snapshot: MoveSnapshot) {
        self.total_moves += 1;
        self.total_accuracy += snapshot.accuracy;
        self.average_accuracy = self.total_accuracy / f64::from(self.total_moves);
        self.moves.push(snapshot);
    }
}

/// How a finished game ended
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    #[serde(rename = "White wins")]
    WhiteWins,
    #[serde(rename = "Black wins")]
    BlackWins,
    #[serde(rename = "Draw")]
    Draw,
    #[serde(rename = "Stalemate")]
    Stalemate,
    #[serde(rename = "Draw by repetition")]
    DrawByRepetition,
    #[serde(rename = "Draw by insufficient material")]
    DrawByInsufficientMaterial,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameResult::WhiteWins => "White wins",
            GameResult::BlackWins => "Black wins",
            GameResult::Draw => "Draw",
            GameResult::Stalemate => "Stalemate",
            GameResult::DrawByRepetition => "Draw by repetition",
            GameResult::DrawByInsufficientMaterial => "Draw by insufficient material",
        };
        f.write_str(label)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveStatus {
    Completed,
}

/// Archived copy of a completed game
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinishedGame {
    pub id: String,
    pub game_number: u64,
    pub fen: String,
    pub moves: Vec<MoveRecord>,
    pub ended_at: DateTime<Utc>,
    pub last_move_by: Option<String>,
    pub result: GameResult,
    pub status: ArchiveStatus,
}

impl FinishedGame {
    /// Replay the stored moves from the initial position and return the final FEN
    pub fn replay(&self) -> Result<String> {
        let mut position = Position::initial();
        for record in &self.moves {
            position = position.play_san(&record.san)?.position;
        }
        Ok(position.fen())
    }
}
