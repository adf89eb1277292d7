use chess::{Board, BoardStatus, Color, Piece, Square, EMPTY};
use std::collections::HashMap;

use crate::error::GameResult;
use crate::game::engine::{Played, Position};
use crate::models::GameResult as FinalResult;

/// Why a game is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    Repetition,
    FiftyMoveRule,
}

impl Outcome {
    pub fn result(&self) -> FinalResult {
        match self {
            Outcome::Checkmate {
                winner: Color::White,
            } => FinalResult::WhiteWins,
            Outcome::Checkmate {
                winner: Color::Black,
            } => FinalResult::BlackWins,
            Outcome::Stalemate => FinalResult::Stalemate,
            Outcome::InsufficientMaterial => FinalResult::DrawByInsufficientMaterial,
            Outcome::Repetition => FinalResult::DrawByRepetition,
            Outcome::FiftyMoveRule => FinalResult::Draw,
        }
    }

    pub fn is_checkmate(&self) -> bool {
        matches!(self, Outcome::Checkmate { .. })
    }

    pub fn is_draw(&self) -> bool {
        !self.is_checkmate()
    }
}

/// Terminal state judged from a single position (no repetition knowledge)
pub fn position_outcome(position: &Position) -> Option<Outcome> {
    outcome_with_repetitions(position, 1)
}

fn outcome_with_repetitions(position: &Position, occurrences: u32) -> Option<Outcome> {
    let board = position.board();
    match board.status() {
        BoardStatus::Checkmate => {
            return Some(Outcome::Checkmate {
                winner: !board.side_to_move(),
            })
        }
        BoardStatus::Stalemate => return Some(Outcome::Stalemate),
        BoardStatus::Ongoing => {}
    }

    if has_insufficient_material(board) {
        Some(Outcome::InsufficientMaterial)
    } else if occurrences >= 3 {
        Some(Outcome::Repetition)
    } else if position.halfmove_clock() >= 100 {
        Some(Outcome::FiftyMoveRule)
    } else {
        None
    }
}

/// Get the current game status as a string
pub fn status_label(position: &Position) -> &'static str {
    match position.board().status() {
        BoardStatus::Checkmate => "checkmate",
        BoardStatus::Stalemate => "stalemate",
        BoardStatus::Ongoing if position.in_check() => "check",
        BoardStatus::Ongoing => "in_progress",
    }
}

/// Positions seen so far in the current game, for repetition detection
#[derive(Debug, Clone)]
pub struct GameHistory {
    position: Position,
    occurrences: HashMap<u64, u32>,
}

impl GameHistory {
    pub fn new() -> Self {
        let position = Position::initial();
        let mut occurrences = HashMap::new();
        occurrences.insert(position.board().get_hash(), 1);
        Self {
            position,
            occurrences,
        }
    }

    /// Rebuild the history by replaying SAN moves from the initial position
    pub fn replay<'a>(sans: impl IntoIterator<Item = &'a str>) -> GameResult<Self> {
        let mut history = Self::new();
        for san in sans {
            let played = history.position.play_san(san)?;
            history.push(played);
        }
        Ok(history)
    }

    pub fn push(&mut self, played: Played) {
        self.position = played.position;
        *self
            .occurrences
            .entry(self.position.board().get_hash())
            .or_insert(0) += 1;
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn outcome(&self) -> Option<Outcome> {
        let seen = self
            .occurrences
            .get(&self.position.board().get_hash())
            .copied()
            .unwrap_or(1);
        outcome_with_repetitions(&self.position, seen)
    }
}

impl Default for GameHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if the board has insufficient material for checkmate
pub fn has_insufficient_material(board: &Board) -> bool {
    let heavy = *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy != EMPTY {
        return false;
    }

    let knights = *board.pieces(Piece::Knight);
    let bishops = *board.pieces(Piece::Bishop);
    match (knights | bishops).popcnt() {
        // King vs King, King and minor piece vs King
        0 | 1 => true,
        // King and Bishop vs King and Bishop (bishops on same color)
        2 if knights == EMPTY => {
            let white = bishops & *board.color_combined(Color::White);
            let black = bishops & *board.color_combined(Color::Black);
            if white.popcnt() != 1 || black.popcnt() != 1 {
                return false;
            }
            let shade = |set: chess::BitBoard| set.map(square_shade).next();
            shade(white) == shade(black)
        }
        _ => false,
    }
}

fn square_shade(square: Square) -> usize {
    (square.get_rank().to_index() + square.get_file().to_index()) % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(moves: &[(&str, &str)]) -> GameHistory {
        let mut history = GameHistory::new();
        for (from, to) in moves {
            let played = history.position().play(from, to).unwrap();
            history.push(played);
        }
        history
    }

    fn material(fen: &str) -> bool {
        has_insufficient_material(Position::from_fen(fen).unwrap().board())
    }

    #[test]
    fn fools_mate_is_a_black_win() {
        let history = history_of(&[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);
        let outcome = history.outcome().unwrap();
        assert_eq!(
            outcome,
            Outcome::Checkmate {
                winner: Color::Black
            }
        );
        assert_eq!(outcome.result(), FinalResult::BlackWins);
        assert_eq!(status_label(history.position()), "checkmate");
    }

    #[test]
    fn stalemate_is_detected() {
        let position = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(position_outcome(&position), Some(Outcome::Stalemate));
        assert_eq!(Outcome::Stalemate.result().to_string(), "Stalemate");
    }

    #[test]
    fn insufficient_material_cases() {
        assert!(material("8/8/8/4k3/8/8/8/4K3 w - - 0 1"));
        assert!(material("8/8/8/4k3/8/8/8/2B1K3 w - - 0 1"));
        assert!(material("8/8/8/4k3/8/8/8/1N2K3 w - - 0 1"));
        assert!(material("5b2/8/8/4k3/8/8/8/2B1K3 w - - 0 1"));
        assert!(!material("2b5/8/8/4k3/8/8/8/2B1K3 w - - 0 1"));
        assert!(!material("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1"));
        assert!(!material("8/8/8/4k3/8/8/8/1NN1K3 w - - 0 1"));
    }

    #[test]
    fn threefold_repetition() {
        let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
        let twice = history_of(&shuffle);
        assert_eq!(twice.outcome(), None);

        let mut moves = shuffle.to_vec();
        moves.extend_from_slice(&shuffle);
        let thrice = history_of(&moves);
        assert_eq!(thrice.outcome(), Some(Outcome::Repetition));
        assert_eq!(Outcome::Repetition.result(), FinalResult::DrawByRepetition);
    }

    #[test]
    fn fifty_move_rule_is_a_plain_draw() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 99 80").unwrap();
        assert_eq!(position_outcome(&position), None);
        let after = position.play("a1", "a2").unwrap().position;
        assert_eq!(position_outcome(&after), Some(Outcome::FiftyMoveRule));
        assert_eq!(Outcome::FiftyMoveRule.result(), FinalResult::Draw);
    }

    #[test]
    fn replay_rebuilds_history() {
        let history = GameHistory::replay(["e4", "e5", "Nf3"]).unwrap();
        assert_eq!(history.position().fullmove_number(), 2);
        assert_eq!(status_label(history.position()), "in_progress");
        assert!(GameHistory::replay(["e5"]).is_err());
    }
}
