use futures::future::try_join;
use log::warn;
use std::sync::Arc;

use crate::error::{GameError, GameResult};
use crate::game::engine::Position;
use crate::game::evaluator::Evaluator;
use crate::game::rules::{position_outcome, Outcome};

/// Score given when the evaluator cannot be reached
pub const FALLBACK_ACCURACY: f64 = 50.0;
pub const CHECKMATE_ACCURACY: f64 = 100.0;
pub const DRAW_ACCURACY: f64 = 50.0;

/// Map an evaluation swing (in pawns) onto a 0-100 score
pub fn accuracy_for_delta(delta: f64) -> f64 {
    let delta = delta.abs();
    let accuracy = if delta == 0.0 {
        100.0
    } else if delta <= 0.5 {
        90.0
    } else if delta <= 1.0 {
        80.0
    } else if delta <= 2.0 {
        70.0
    } else if delta <= 3.0 {
        60.0
    } else {
        (50.0 - (delta - 3.0) * 10.0).max(0.0)
    };
    accuracy.round()
}

/// Turns pre/post-move evaluations into a move score; never fails
#[derive(Clone)]
pub struct AccuracyScorer {
    evaluator: Arc<dyn Evaluator>,
}

impl AccuracyScorer {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Score a move judged only from the two positions
    pub async fn score(&self, prev_fen: &str, new_fen: &str) -> f64 {
        let outcome = Position::from_fen(new_fen)
            .ok()
            .and_then(|position| position_outcome(&position));
        self.score_transition(prev_fen, new_fen, outcome).await
    }

    /// Score a move whose terminal outcome (if any) is already known
    pub async fn score_transition(
        &self,
        prev_fen: &str,
        new_fen: &str,
        outcome: Option<Outcome>,
    ) -> f64 {
        match outcome {
            Some(outcome) if outcome.is_checkmate() => return CHECKMATE_ACCURACY,
            Some(_) => return DRAW_ACCURACY,
            None => {}
        }

        match self.delta(prev_fen, new_fen).await {
            Ok(delta) => accuracy_for_delta(delta),
            Err(err) => {
                warn!("Falling back to neutral accuracy: {}", err);
                FALLBACK_ACCURACY
            }
        }
    }

    async fn delta(&self, prev_fen: &str, new_fen: &str) -> GameResult<f64> {
        let (before, after) = try_join(
            self.evaluator.evaluate(prev_fen),
            self.evaluator.evaluate(new_fen),
        )
        .await?;

        let delta = (after - before).abs();
        if delta.is_finite() {
            Ok(delta)
        } else {
            Err(GameError::EvaluatorUnavailable(format!(
                "non-finite evaluation {} -> {}",
                before, after
            )))
        }
    }
}
