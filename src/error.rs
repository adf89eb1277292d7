use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::ServerMessage;

/// Result alias used by every core operation
pub type GameResult<T> = Result<T, GameError>;

/// Failures surfaced by the lock, move, lifecycle and token operations
#[derive(Debug, Error)]
pub enum GameError {
    #[error("board is locked by {holder} until {until}")]
    AlreadyLocked {
        holder: String,
        until: DateTime<Utc>,
    },

    #[error("you do not hold the board lock")]
    NotLockHolder,

    #[error("insufficient tokens (balance {balance})")]
    InsufficientTokens { balance: u32 },

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("move no longer applies: {0}")]
    InvalidMove(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("position evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),

    #[error("concurrent update, please retry")]
    TransactionConflict,

    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("wait for {remaining} more move(s) by other players")]
    MustWait { remaining: u32 },

    #[error("invalid token amount: {0}")]
    InvalidAmount(u32),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("store error: {0}")]
    Store(String),
}

impl GameError {
    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::AlreadyLocked { .. } => "already_locked",
            GameError::NotLockHolder => "not_lock_holder",
            GameError::InsufficientTokens { .. } => "insufficient_tokens",
            GameError::IllegalMove(_) => "illegal_move",
            GameError::InvalidMove(_) => "invalid_move",
            GameError::NotFound(_) => "not_found",
            GameError::EvaluatorUnavailable(_) => "evaluator_unavailable",
            GameError::TransactionConflict => "transaction_conflict",
            GameError::InvalidFen(_) => "invalid_fen",
            GameError::MustWait { .. } => "must_wait",
            GameError::InvalidAmount(_) => "invalid_amount",
            GameError::BadRequest(_) => "bad_request",
            GameError::Unauthenticated => "unauthenticated",
            GameError::Store(_) => "store_error",
        }
    }
}

/// Errors raised by a transactional store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("precondition failed on {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => GameError::TransactionConflict,
            StoreError::Unavailable(reason) => GameError::Store(reason),
        }
    }
}

/// Errors from the external position evaluator
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("evaluator returned status {0}")]
    Status(u16),

    #[error("response carried no evaluation")]
    MissingEval,
}

impl From<EvaluatorError> for GameError {
    fn from(err: EvaluatorError) -> Self {
        GameError::EvaluatorUnavailable(err.to_string())
    }
}

impl ResponseError for GameError {
    fn status_code(&self) -> StatusCode {
        match self {
            GameError::AlreadyLocked { .. }
            | GameError::NotLockHolder
            | GameError::TransactionConflict => StatusCode::CONFLICT,
            GameError::InsufficientTokens { .. } => StatusCode::PAYMENT_REQUIRED,
            GameError::IllegalMove(_) | GameError::InvalidMove(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::MustWait { .. } => StatusCode::TOO_MANY_REQUESTS,
            GameError::InvalidFen(_)
            | GameError::InvalidAmount(_)
            | GameError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GameError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GameError::EvaluatorUnavailable(_) | GameError::Store(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ServerMessage::error(self))
    }
}
