use actix::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::game::CandidateMove;
use crate::models::{FinishedGame, GameResult, GameState, MoveRecord};
use crate::store::ChangeEvent;

/// Message sent from a websocket client to the server
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub message_type: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub promotion: Option<String>,
}

/// Message pushed from the server to websocket clients, also used as the error body
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<MoveRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_game: Option<FinishedGameSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateMove>,
}

impl ServerMessage {
    pub fn new(message_type: &str) -> Self {
        Self {
            message_type: message_type.to_string(),
            ..Default::default()
        }
    }

    pub fn error(err: &GameError) -> Self {
        Self {
            code: Some(err.code().to_string()),
            error: Some(err.to_string()),
            ..Self::new("error")
        }
    }

    pub fn game_state(game: GameState) -> Self {
        Self {
            game: Some(game),
            ..Self::new("game_state")
        }
    }

    pub fn chat(chat: ChatMessage) -> Self {
        Self {
            chat: Some(chat),
            ..Self::new("chat")
        }
    }

    pub fn candidate(candidate: CandidateMove) -> Self {
        Self {
            candidate: Some(candidate),
            ..Self::new("candidate")
        }
    }

    /// Translate a store change into a client push; private account changes are not relayed
    pub fn from_change(event: ChangeEvent) -> Option<Self> {
        match event {
            ChangeEvent::GameChanged(game) => Some(Self::game_state(game)),
            ChangeEvent::MoveAppended(record) => Some(Self {
                last_move: Some(record),
                ..Self::new("move_appended")
            }),
            ChangeEvent::LedgerCleared => Some(Self::new("ledger_cleared")),
            ChangeEvent::GameArchived(game) => Some(Self {
                finished_game: Some(FinishedGameSummary::from(&game)),
                ..Self::new("game_archived")
            }),
            ChangeEvent::MoveCountChanged(_) | ChangeEvent::UserChanged(_) => None,
        }
    }
}

/// System announcement posted to the chat collaborator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub content: String,
    pub player_name: String,
    pub game_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Archive listing entry without the move list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinishedGameSummary {
    pub id: String,
    pub game_number: u64,
    pub ended_at: DateTime<Utc>,
    pub last_move_by: Option<String>,
    pub result: GameResult,
    pub move_count: usize,
}

impl From<&FinishedGame> for FinishedGameSummary {
    fn from(game: &FinishedGame) -> Self {
        Self {
            id: game.id.clone(),
            game_number: game.game_number,
            ended_at: game.ended_at,
            last_move_by: game.last_move_by.clone(),
            result: game.result,
            move_count: game.moves.len(),
        }
    }
}

/// Candidate move submitted for preview or commit
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    pub user_id: String,
    pub amount: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LegalQuery {
    pub from: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Message type for pushing text to a websocket session
#[derive(Message)]
#[rtype(result = "()")]
pub struct LiveMessage(pub String);
