//! Move classification: one `Classification` per half-move from consecutive
//! evaluation pairs plus the move record.

pub mod tags;
pub mod tier;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shakmaty::Chess;

use chess_core::rules;
use chess_core::{GameTimeline, OpeningMatcher, OpeningRef, PieceKind, Side};

use crate::error::ReviewError;
use crate::evaluation::NormalizedEvaluation;

use self::tags::{derive_tags, EarlierMove, MoveFacts, ReplyFacts};
use self::tier::{assign_tier, TierInput};

/// Move quality, most desirable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Brilliant,
    Great,
    Best,
    Good,
    Book,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Tier {
    pub const ALL: [Tier; 8] = [
        Tier::Brilliant,
        Tier::Great,
        Tier::Best,
        Tier::Good,
        Tier::Book,
        Tier::Inaccuracy,
        Tier::Mistake,
        Tier::Blunder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Brilliant => "brilliant",
            Tier::Great => "great",
            Tier::Best => "best",
            Tier::Good => "good",
            Tier::Book => "book",
            Tier::Inaccuracy => "inaccuracy",
            Tier::Mistake => "mistake",
            Tier::Blunder => "blunder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    IsCheck,
    IsCapture,
    IsCastling,
    MissedMate,
    HangingPiece,
    LostMaterial,
    MissedTactic,
    WeakenedKing,
    IgnoredThreat,
    MissedFork,
    MissedCastling,
    EarlyQueen,
    KnightOnRim,
    EdgePawnPush,
    RedundantMove,
    BadTrade,
    AllowedTrade,
    KicksPiece,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::IsCheck => "is_check",
            Tag::IsCapture => "is_capture",
            Tag::IsCastling => "is_castling",
            Tag::MissedMate => "missed_mate",
            Tag::HangingPiece => "hanging_piece",
            Tag::LostMaterial => "lost_material",
            Tag::MissedTactic => "missed_tactic",
            Tag::WeakenedKing => "weakened_king",
            Tag::IgnoredThreat => "ignored_threat",
            Tag::MissedFork => "missed_fork",
            Tag::MissedCastling => "missed_castling",
            Tag::EarlyQueen => "early_queen",
            Tag::KnightOnRim => "knight_on_rim",
            Tag::EdgePawnPush => "edge_pawn_push",
            Tag::RedundantMove => "redundant_move",
            Tag::BadTrade => "bad_trade",
            Tag::AllowedTrade => "allowed_trade",
            Tag::KicksPiece => "kicks_piece",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

/// Phase of a position `ply` half-moves into the game.
pub fn game_phase(pos: &Chess, ply: usize) -> GamePhase {
    let pieces = rules::minor_major_count(pos);
    if ply < 24 && pieces >= 10 {
        GamePhase::Opening
    } else if pieces <= 6 {
        GamePhase::Endgame
    } else {
        GamePhase::Middlegame
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub ply: usize,
    pub san: String,
    pub uci: String,
    pub tier: Tier,
    /// Pawns lost by the mover; negative when the move improved their position
    pub cp_loss: f64,
    /// White-perspective
    pub eval_before: f64,
    pub eval_after: f64,
    pub mate_before: bool,
    pub mate_after: bool,
    pub best_move_uci: Option<String>,
    pub best_move_san: Option<String>,
    pub tags: BTreeSet<Tag>,
    pub phase: GamePhase,
    pub material_delta: i32,
    pub hung_piece: Option<PieceKind>,
    pub opening: Option<OpeningRef>,
}

impl Classification {
    pub fn mover(&self, first: Side) -> Side {
        Side::for_ply(first, self.ply)
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct MoveClassifier {
    openings: OpeningMatcher,
}

impl Default for MoveClassifier {
    fn default() -> Self {
        Self::new(OpeningMatcher::new())
    }
}

impl MoveClassifier {
    pub fn new(openings: OpeningMatcher) -> Self {
        Self { openings }
    }

    /// Classify every half-move. `evaluations` must hold one entry per position.
    pub fn classify(
        &self,
        timeline: &GameTimeline,
        evaluations: &[NormalizedEvaluation],
    ) -> Result<Vec<Classification>, ReviewError> {
        if evaluations.len() != timeline.positions().len() {
            return Err(ReviewError::Position {
                ply: evaluations.len(),
                reason: format!(
                    "expected {} evaluations, got {}",
                    timeline.positions().len(),
                    evaluations.len()
                ),
            });
        }

        let boards = timeline
            .positions()
            .iter()
            .enumerate()
            .map(|(ply, snapshot)| {
                snapshot.board().map_err(|e| ReviewError::Position {
                    ply,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sans = timeline.san_moves();
        let mut classifications = Vec::with_capacity(timeline.move_count());

        for ply in 0..timeline.move_count() {
            let facts = self.gather_facts(timeline, &boards, evaluations, ply);
            let tier = assign_tier(&TierInput {
                ply,
                cp_loss: facts.cp_loss,
                matches_engine: facts.matches_engine,
            });

            let opening = if tier == Tier::Book {
                self.openings.lookup(&sans[..=ply])
            } else {
                None
            };

            let before = &evaluations[ply];
            let after = &evaluations[ply + 1];
            let best_move_san = before
                .best_move
                .as_deref()
                .and_then(|uci| rules::uci_to_san(&boards[ply], uci));

            classifications.push(Classification {
                ply,
                san: facts.san.clone(),
                uci: timeline.moves()[ply].uci.clone(),
                tier,
                cp_loss: facts.cp_loss,
                eval_before: before.score,
                eval_after: after.score,
                mate_before: before.is_mate,
                mate_after: after.is_mate,
                best_move_uci: before.best_move.clone(),
                best_move_san,
                tags: derive_tags(&facts).collect(),
                phase: facts.phase,
                material_delta: facts.material_delta,
                hung_piece: facts.hung_piece(),
                opening,
            });
        }

        Ok(classifications)
    }

    fn gather_facts(
        &self,
        timeline: &GameTimeline,
        boards: &[Chess],
        evaluations: &[NormalizedEvaluation],
        ply: usize,
    ) -> MoveFacts {
        let played = &timeline.moves()[ply];
        let before = &evaluations[ply];
        let after = &evaluations[ply + 1];
        let (pre, post) = (&boards[ply], &boards[ply + 1]);
        let mover = played.color;

        let score_before = before.collapsed_score();
        let score_after = after.collapsed_score();
        let cp_loss = round_cents(match mover {
            Side::White => score_before - score_after,
            Side::Black => score_after - score_before,
        });

        let engine_best = before.best_move.as_deref();
        let matches_engine = engine_best
            .is_some_and(|best| best.get(..4).is_some() && best.get(..4) == played.uci.get(..4));
        let engine_best_piece = engine_best
            .and_then(|best| rules::inspect_uci(pre, best))
            .map(|shape| shape.piece);

        // Opponent's expected reply, resolved on the position after the move
        let reply_uci = after.pv.first().map(String::as_str);
        let reply = reply_uci.and_then(|uci| {
            let shape = rules::inspect_uci(post, uci)?;
            Some(ReplyFacts {
                source_piece: rules::piece_on(post, &shape.from),
                target_piece: rules::piece_on(post, &shape.to),
                is_capture: shape.is_capture,
            })
        });

        let settled = reply_uci
            .and_then(|uci| rules::play_uci(post, uci))
            .unwrap_or_else(|| post.clone());
        let material_delta = mover.sign()
            * (rules::material_balance(&settled) - rules::material_balance(pre));

        let pre_pv_san = rules::line_to_san(pre, &before.pv);

        let two_plies_back = ply.checked_sub(2).map(|earlier| {
            let record = &timeline.moves()[earlier];
            EarlierMove {
                piece: record.piece,
                to: record.to.clone(),
            }
        });

        MoveFacts {
            ply,
            mover,
            san: played.san.clone(),
            piece: played.piece,
            from: played.from.clone(),
            to: played.to.clone(),
            phase: game_phase(pre, ply),
            cp_loss,
            score_before,
            score_after,
            mate_for_mover_before: before.is_mate_for(mover),
            mate_after: after.is_mate,
            matches_engine,
            engine_best_piece,
            material_delta,
            pre_pv_san,
            reply,
            two_plies_back,
        }
    }
}
