//! Evaluation results and their White-perspective normalisation.

use serde::{Deserialize, Serialize};

use chess_core::Side;

use crate::protocol::SearchUpdate;

/// Conventional "infinite" bound a mate score collapses to.
pub const MATE_SCORE: f64 = 100.0;

/// Where an evaluation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalSource {
    /// The engine finished the search and sent `bestmove`.
    Engine,
    /// The deadline fired; the result is the deepest partial seen, if any.
    TimedOut,
    /// Checkmate or stalemate, synthesised without the engine.
    Terminal,
}

/// Engine output for one position, side-to-move perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub depth: u32,
    pub score: f64,
    pub is_mate: bool,
    pub pv: Vec<String>,
    pub best_move: Option<String>,
    pub source: EvalSource,
}

impl EvaluationResult {
    /// Build a result from the deepest update of a search. The terminating
    /// move is used as best move when the update has no PV.
    pub fn from_search(
        update: Option<SearchUpdate>,
        bestmove: Option<String>,
        source: EvalSource,
    ) -> Self {
        match update {
            Some(update) => Self {
                depth: update.depth,
                score: update.score,
                is_mate: update.is_mate,
                best_move: update.best_move.or(bestmove),
                pv: update.pv,
                source,
            },
            None => Self {
                depth: 0,
                score: 0.0,
                is_mate: false,
                pv: bestmove.iter().cloned().collect(),
                best_move: bestmove,
                source,
            },
        }
    }

    /// Re-express the score from White's perspective. `side` is the side to
    /// move in the evaluated position.
    pub fn normalize(self, side: Side) -> NormalizedEvaluation {
        let score = match side {
            Side::White => self.score,
            Side::Black => -self.score,
        };
        NormalizedEvaluation {
            depth: self.depth,
            score,
            is_mate: self.is_mate,
            pv: self.pv,
            best_move: self.best_move,
            source: self.source,
        }
    }
}

/// White-perspective evaluation; the PV stays in coordinate notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvaluation {
    pub depth: u32,
    pub score: f64,
    pub is_mate: bool,
    pub pv: Vec<String>,
    pub best_move: Option<String>,
    pub source: EvalSource,
}

impl NormalizedEvaluation {
    /// Score for loss arithmetic: mate scores collapse to +/-100 by sign.
    /// A signed zero (`mate 0`) keeps its sign.
    pub fn collapsed_score(&self) -> f64 {
        if !self.is_mate {
            self.score
        } else if self.score.is_sign_negative() {
            -MATE_SCORE
        } else {
            MATE_SCORE
        }
    }

    /// A mate score favouring `side`.
    pub fn is_mate_for(&self, side: Side) -> bool {
        self.is_mate && f64::from(side.sign()) * self.collapsed_score() > 0.0
    }
}
