use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Rank, Square, EMPTY};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{GameError, GameResult};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A board plus the move clocks the `chess` crate does not keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
}

/// Result of playing one legal move
#[derive(Debug, Clone, Copy)]
pub struct Played {
    pub chess_move: ChessMove,
    pub position: Position,
}

/// A locally validated move that has not been persisted
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMove {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
    pub san: String,
    pub fen_before: String,
    pub fen_after: String,
}

/// Validate a move against `fen` without touching shared state.
///
/// Pawns reaching the last rank always become queens, whatever `promotion` asks for.
pub fn propose_move(
    fen: &str,
    from: &str,
    to: &str,
    promotion: Option<&str>,
) -> GameResult<CandidateMove> {
    let position = Position::from_fen(fen)?;
    let played = position.play(from, to)?;
    if let Some(requested) = promotion {
        if played.chess_move.get_promotion().is_some() && !requested.eq_ignore_ascii_case("q") {
            log::debug!("Ignoring promotion to {}, queening instead", requested);
        }
    }
    Ok(position.candidate(played))
}

impl Position {
    pub fn initial() -> Self {
        Self {
            board: Board::default(),
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn from_fen(fen: &str) -> GameResult<Self> {
        let invalid = || GameError::InvalidFen(fen.to_string());
        let board = Board::from_str(fen).map_err(|_| invalid())?;

        let mut clocks = fen.split_whitespace().skip(4);
        let halfmove_clock = match clocks.next() {
            Some(field) => field.parse().map_err(|_| invalid())?,
            None => 0,
        };
        let fullmove_number = match clocks.next() {
            Some(field) => field.parse().map_err(|_| invalid())?,
            None => 1,
        };

        Ok(Self {
            board,
            halfmove_clock,
            fullmove_number,
        })
    }

    pub fn fen(&self) -> String {
        let rendered = self.board.to_string();
        let head: Vec<&str> = rendered.split_whitespace().take(3).collect();
        format!(
            "{} {} {} {}",
            head.join(" "),
            self.en_passant_target(),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    /// FEN names the square the capturing pawn lands on, while `chess` keeps the pushed pawn's square
    fn en_passant_target(&self) -> String {
        match self.board.en_passant() {
            Some(pushed) => {
                let rank = match self.board.side_to_move() {
                    Color::White => Rank::Sixth,
                    Color::Black => Rank::Third,
                };
                Square::make_square(rank, pushed.get_file()).to_string()
            }
            None => "-".to_string(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    /// Play `from`-`to` for the side to move, auto-queening pawns
    pub fn play(&self, from: &str, to: &str) -> GameResult<Played> {
        let source = parse_square(from)?;
        let dest = parse_square(to)?;
        let side = self.board.side_to_move();

        let piece = self
            .board
            .piece_on(source)
            .ok_or_else(|| GameError::IllegalMove(format!("no piece on {}", source)))?;
        if self.board.color_on(source) != Some(side) {
            return Err(GameError::IllegalMove(format!(
                "it is {}'s turn",
                color_to_string(side)
            )));
        }

        let last_rank = match side {
            Color::White => Rank::Eighth,
            Color::Black => Rank::First,
        };
        let promotion = if piece == Piece::Pawn && dest.get_rank() == last_rank {
            Some(Piece::Queen)
        } else {
            None
        };

        let chess_move = ChessMove::new(source, dest, promotion);
        if !self.board.legal(chess_move) {
            return Err(GameError::IllegalMove(format!(
                "{}{} is not legal in this position",
                source, dest
            )));
        }
        Ok(self.play_move(chess_move))
    }

    /// Play a move given in SAN, with or without its check suffix
    pub fn play_san(&self, san: &str) -> GameResult<Played> {
        let wanted = san.trim_end_matches(['+', '#']);
        MoveGen::new_legal(&self.board)
            .find(|candidate| self.san(*candidate).trim_end_matches(['+', '#']) == wanted)
            .map(|chess_move| self.play_move(chess_move))
            .ok_or_else(|| GameError::IllegalMove(format!("{} is not legal here", san)))
    }

    /// Apply a move already known to be legal
    pub fn play_move(&self, chess_move: ChessMove) -> Played {
        let moving = self.board.piece_on(chess_move.get_source());
        let resets_clock = moving == Some(Piece::Pawn) || self.is_capture(chess_move);
        let side = self.board.side_to_move();

        let position = Position {
            board: self.board.make_move_new(chess_move),
            halfmove_clock: if resets_clock {
                0
            } else {
                self.halfmove_clock + 1
            },
            fullmove_number: if side == Color::Black {
                self.fullmove_number + 1
            } else {
                self.fullmove_number
            },
        };

        Played {
            chess_move,
            position,
        }
    }

    /// Standard algebraic notation for a legal move in this position
    pub fn san(&self, chess_move: ChessMove) -> String {
        let source = chess_move.get_source();
        let dest = chess_move.get_dest();
        let piece = self.board.piece_on(source).unwrap_or(Piece::Pawn);
        let capture = self.is_capture(chess_move);

        let mut san = String::new();
        let file_distance =
            (source.get_file().to_index() as i32 - dest.get_file().to_index() as i32).abs();

        if piece == Piece::King && file_distance == 2 {
            san.push_str(if dest.get_file().to_index() > source.get_file().to_index() {
                "O-O"
            } else {
                "O-O-O"
            });
        } else if piece == Piece::Pawn {
            if capture {
                san.push(file_char(source));
                san.push('x');
            }
            san.push_str(&dest.to_string());
            if let Some(promoted) = chess_move.get_promotion() {
                san.push('=');
                san.push(piece_letter(promoted));
            }
        } else {
            san.push(piece_letter(piece));
            san.push_str(&self.disambiguation(chess_move, piece));
            if capture {
                san.push('x');
            }
            san.push_str(&dest.to_string());
        }

        let after = self.board.make_move_new(chess_move);
        if after.status() == BoardStatus::Checkmate {
            san.push('#');
        } else if *after.checkers() != EMPTY {
            san.push('+');
        }
        san
    }

    /// Target squares reachable by the piece on `from`
    pub fn legal_destinations(&self, from: &str) -> GameResult<Vec<String>> {
        let source = parse_square(from)?;
        let mut targets: Vec<String> = MoveGen::new_legal(&self.board)
            .filter(|chess_move| chess_move.get_source() == source)
            .map(|chess_move| chess_move.get_dest().to_string())
            .collect();
        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    pub(crate) fn candidate(&self, played: Played) -> CandidateMove {
        CandidateMove {
            from: played.chess_move.get_source().to_string(),
            to: played.chess_move.get_dest().to_string(),
            promotion: played
                .chess_move
                .get_promotion()
                .map(|piece| piece_letter(piece).to_ascii_lowercase().to_string()),
            san: self.san(played.chess_move),
            fen_before: self.fen(),
            fen_after: played.position.fen(),
        }
    }

    fn is_capture(&self, chess_move: ChessMove) -> bool {
        let source = chess_move.get_source();
        let dest = chess_move.get_dest();
        self.board.piece_on(dest).is_some()
            || (self.board.piece_on(source) == Some(Piece::Pawn)
                && source.get_file() != dest.get_file())
    }

    fn disambiguation(&self, chess_move: ChessMove, piece: Piece) -> String {
        let source = chess_move.get_source();
        let rivals: Vec<Square> = MoveGen::new_legal(&self.board)
            .filter(|other| {
                other.get_dest() == chess_move.get_dest()
                    && other.get_source() != source
                    && self.board.piece_on(other.get_source()) == Some(piece)
            })
            .map(|other| other.get_source())
            .collect();

        if rivals.is_empty() {
            String::new()
        } else if rivals.iter().all(|sq| sq.get_file() != source.get_file()) {
            file_char(source).to_string()
        } else if rivals.iter().all(|sq| sq.get_rank() != source.get_rank()) {
            rank_char(source).to_string()
        } else {
            source.to_string()
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

/// Convert a chess Color to a string representation
pub fn color_to_string(color: Color) -> String {
    match color {
        Color::White => "white".to_string(),
        Color::Black => "black".to_string(),
    }
}

fn parse_square(name: &str) -> GameResult<Square> {
    Square::from_str(&name.trim().to_lowercase())
        .map_err(|_| GameError::IllegalMove(format!("unknown square {}", name)))
}

fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_all(moves: &[(&str, &str)]) -> (Position, Vec<String>) {
        let mut position = Position::initial();
        let mut sans = Vec::new();
        for (from, to) in moves {
            let played = position.play(from, to).unwrap();
            sans.push(position.san(played.chess_move));
            position = played.position;
        }
        (position, sans)
    }

    #[test]
    fn opening_pawn_push() {
        let candidate = propose_move(STARTING_FEN, "e2", "e4", None).unwrap();
        assert_eq!(candidate.san, "e4");
        assert_eq!(candidate.fen_before, STARTING_FEN);
        assert!(candidate
            .fen_after
            .starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq"));
        assert!(candidate.fen_after.ends_with(" 0 1"));
    }

    #[test]
    fn en_passant_target_square_in_fen() {
        let before = "rnbqkbnr/ppp1pppp/8/8/3p4/8/PPPPPPPP/RNBQKBNR w KQkq - 0 3";
        let after = Position::from_fen(before)
            .unwrap()
            .play("e2", "e4")
            .unwrap()
            .position;
        let expected = "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3";
        assert_eq!(after.fen(), expected);
        assert_eq!(Position::from_fen(expected).unwrap().fen(), expected);

        let before = "rnbqkbnr/pppppppp/8/4P3/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 3";
        let after = Position::from_fen(before)
            .unwrap()
            .play("d7", "d5")
            .unwrap()
            .position;
        let expected = "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 4";
        assert_eq!(after.fen(), expected);

        let capture = after.play("e5", "d6").unwrap();
        assert_eq!(after.san(capture.chess_move), "exd6");
        assert!(capture
            .position
            .fen()
            .starts_with("rnbqkbnr/ppp1pppp/3P4/8/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 4"));
    }

    #[test]
    fn rejects_moving_out_of_turn() {
        let err = propose_move(STARTING_FEN, "e7", "e5", None).unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)));
    }

    #[test]
    fn rejects_empty_square_and_garbage() {
        assert!(matches!(
            propose_move(STARTING_FEN, "e4", "e5", None),
            Err(GameError::IllegalMove(_))
        ));
        assert!(matches!(
            propose_move(STARTING_FEN, "z9", "e5", None),
            Err(GameError::IllegalMove(_))
        ));
        assert!(matches!(
            propose_move("not a fen", "e2", "e4", None),
            Err(GameError::InvalidFen(_))
        ));
    }

    #[test]
    fn pinned_piece_cannot_move() {
        let fen = "4k3/4r3/8/8/8/8/4B3/4K3 w - - 0 1";
        assert!(matches!(
            propose_move(fen, "e2", "d3", None),
            Err(GameError::IllegalMove(_))
        ));
    }

    #[test]
    fn always_promotes_to_queen() {
        let fen = "8/P6k/8/8/8/8/8/K7 w - - 0 1";
        let candidate = propose_move(fen, "a7", "a8", Some("n")).unwrap();
        assert_eq!(candidate.san, "a8=Q");
        assert_eq!(candidate.promotion.as_deref(), Some("q"));
        assert!(candidate.fen_after.starts_with("Q7/7k/"));
    }

    #[test]
    fn castling_notation() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        assert_eq!(propose_move(fen, "e1", "g1", None).unwrap().san, "O-O");
        assert_eq!(propose_move(fen, "e1", "c1", None).unwrap().san, "O-O-O");
    }

    #[test]
    fn disambiguates_by_file_then_rank() {
        let same_rank = "4k3/8/8/8/8/8/8/1N1NK3 w - - 0 1";
        assert_eq!(propose_move(same_rank, "b1", "c3", None).unwrap().san, "Nbc3");

        let same_file = "4k3/8/8/1N6/8/8/8/1N2K3 w - - 0 1";
        assert_eq!(propose_move(same_file, "b1", "c3", None).unwrap().san, "N1c3");
    }

    #[test]
    fn captures_checks_and_mate() {
        let (_, sans) = play_all(&[("e2", "e4"), ("d7", "d5"), ("e4", "d5")]);
        assert_eq!(sans, vec!["e4", "d5", "exd5"]);

        let (position, sans) =
            play_all(&[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);
        assert_eq!(sans.last().map(String::as_str), Some("Qh4#"));
        assert_eq!(position.board().status(), BoardStatus::Checkmate);
        assert!(position.in_check());
    }

    #[test]
    fn clocks_advance() {
        let (position, _) = play_all(&[("g1", "f3"), ("g8", "f6")]);
        assert_eq!(position.halfmove_clock(), 2);
        assert_eq!(position.fullmove_number(), 2);
        assert!(position.fen().ends_with(" 2 2"));

        let reparsed = Position::from_fen(&position.fen()).unwrap();
        assert_eq!(reparsed, position);
    }

    #[test]
    fn legal_destinations_for_a_piece() {
        let position = Position::initial();
        assert_eq!(position.legal_destinations("e2").unwrap(), vec!["e3", "e4"]);
        assert_eq!(position.legal_destinations("g1").unwrap(), vec!["f3", "h3"]);
        assert!(position.legal_destinations("e4").unwrap().is_empty());
    }

    #[test]
    fn san_replay_matches_square_moves() {
        let (expected, sans) = play_all(&[
            ("e2", "e4"),
            ("e7", "e5"),
            ("g1", "f3"),
            ("b8", "c6"),
            ("f1", "b5"),
        ]);
        let mut position = Position::initial();
        for san in &sans {
            position = position.play_san(san).unwrap().position;
        }
        assert_eq!(position.fen(), expected.fen());
        assert!(position.play_san("Ke3").is_err());
    }
}
