pub mod accuracy;
pub mod engine;
pub mod evaluator;
pub mod rules;

pub use accuracy::{accuracy_for_delta, AccuracyScorer};
pub use engine::{color_to_string, propose_move, CandidateMove, Played, Position, STARTING_FEN};
pub use evaluator::{Evaluator, HttpEvaluator};
pub use rules::{has_insufficient_material, position_outcome, status_label, GameHistory, Outcome};
