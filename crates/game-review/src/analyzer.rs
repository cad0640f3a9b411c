//! Full-game evaluation: one White-perspective evaluation per position.

use chess_core::rules::{self, TerminalStatus};
use chess_core::{GameTimeline, Side};
use tracing::{debug, info};

use crate::error::ReviewError;
use crate::evaluation::{EvalSource, NormalizedEvaluation, MATE_SCORE};
use crate::session::PositionEvaluator;

pub struct GameAnalyzer<'a, E: PositionEvaluator + ?Sized> {
    evaluator: &'a E,
    depth: u32,
}

impl<'a, E: PositionEvaluator + ?Sized> GameAnalyzer<'a, E> {
    pub fn new(evaluator: &'a E, depth: u32) -> Self {
        Self { evaluator, depth }
    }

    /// Evaluate every position of the timeline, start position included.
    ///
    /// Requests are issued one at a time; each is awaited before the next is
    /// sent. `progress(done, total)` is called after every position.
    pub async fn analyze<F>(
        &self,
        timeline: &GameTimeline,
        mut progress: F,
    ) -> Result<Vec<NormalizedEvaluation>, ReviewError>
    where
        F: FnMut(usize, usize),
    {
        let positions = timeline.positions();
        let total = positions.len();
        info!(positions = total, depth = self.depth, "Evaluating positions");

        let mut evaluations = Vec::with_capacity(total);
        for (i, snapshot) in positions.iter().enumerate() {
            let board = snapshot.board().map_err(|e| ReviewError::Position {
                ply: i,
                reason: e.to_string(),
            })?;

            let evaluation = match rules::terminal_status(&board) {
                Some(status) => terminal_evaluation(status),
                None => self
                    .evaluator
                    .evaluate_position(&snapshot.fen, self.depth)
                    .await?
                    .normalize(snapshot.side_to_move),
            };
            debug!(
                index = i,
                score = evaluation.score,
                is_mate = evaluation.is_mate,
                source = ?evaluation.source,
                "Position evaluated"
            );

            evaluations.push(evaluation);
            progress(i + 1, total);
        }

        Ok(evaluations)
    }
}

/// Synthesised evaluation for a position with no legal moves.
pub fn terminal_evaluation(status: TerminalStatus) -> NormalizedEvaluation {
    let (score, is_mate) = match status {
        TerminalStatus::Checkmate { mated: Side::White } => (-MATE_SCORE, true),
        TerminalStatus::Checkmate { mated: Side::Black } => (MATE_SCORE, true),
        TerminalStatus::Stalemate => (0.0, false),
    };
    NormalizedEvaluation {
        depth: 0,
        score,
        is_mate,
        pv: Vec::new(),
        best_move: None,
        source: EvalSource::Terminal,
    }
}
