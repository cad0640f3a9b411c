//! Tag derivation. Each tag is an independent predicate over the facts
//! gathered for one half-move.

use chess_core::{PieceKind, Side};

use super::{GamePhase, Tag};

/// cp loss above which mistake-only tags apply
pub const MISTAKE_GATE: f64 = 1.2;

/// Facts about the opponent's expected reply (first move of the post-move PV).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFacts {
    pub is_capture: bool,
    /// Owner and kind of whatever stands on the reply's source square
    pub source_piece: Option<(Side, PieceKind)>,
    /// Owner and kind of whatever stands on the reply's target square
    pub target_piece: Option<(Side, PieceKind)>,
}

/// An earlier half-move by the same side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlierMove {
    pub piece: PieceKind,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct MoveFacts {
    pub ply: usize,
    pub mover: Side,
    pub san: String,
    pub piece: PieceKind,
    pub from: String,
    pub to: String,
    pub phase: GamePhase,
    pub cp_loss: f64,
    /// Collapsed White-perspective scores
    pub score_before: f64,
    pub score_after: f64,
    pub mate_for_mover_before: bool,
    pub mate_after: bool,
    pub matches_engine: bool,
    pub engine_best_piece: Option<PieceKind>,
    /// Material change for the mover across the move and the expected reply
    pub material_delta: i32,
    pub pre_pv_san: Vec<String>,
    pub reply: Option<ReplyFacts>,
    pub two_plies_back: Option<EarlierMove>,
}

impl MoveFacts {
    pub fn is_check(&self) -> bool {
        self.san.contains('+') || self.san.contains('#')
    }

    pub fn is_capture(&self) -> bool {
        self.san.contains('x')
    }

    pub fn is_castling(&self) -> bool {
        self.san.starts_with("O-O")
    }

    fn is_mistake(&self) -> bool {
        self.cp_loss > MISTAKE_GATE
    }

    fn in_opening(&self) -> bool {
        self.phase == GamePhase::Opening
    }

    fn to_file(&self) -> Option<char> {
        self.to.chars().next()
    }

    fn to_rank(&self) -> Option<u32> {
        self.to.chars().nth(1).and_then(|c| c.to_digit(10))
    }

    /// Mover-perspective score before the move.
    fn mover_score_before(&self) -> f64 {
        f64::from(self.mover.sign()) * self.score_before
    }

    /// The mover's own piece the expected reply lands on, on a losing move.
    pub fn hung_piece(&self) -> Option<PieceKind> {
        if !self.is_mistake() {
            return None;
        }
        match self.reply.as_ref()?.target_piece {
            Some((owner, kind)) if owner == self.mover => Some(kind),
            _ => None,
        }
    }
}

pub type TagRule = fn(&MoveFacts) -> bool;

pub const TAG_RULES: &[(Tag, TagRule)] = &[
    (Tag::IsCheck, MoveFacts::is_check),
    (Tag::IsCapture, MoveFacts::is_capture),
    (Tag::IsCastling, MoveFacts::is_castling),
    (Tag::MissedMate, missed_mate),
    (Tag::HangingPiece, hanging_piece),
    (Tag::LostMaterial, lost_material),
    (Tag::MissedTactic, missed_tactic),
    (Tag::WeakenedKing, weakened_king),
    (Tag::IgnoredThreat, ignored_threat),
    (Tag::MissedFork, missed_fork),
    (Tag::MissedCastling, missed_castling),
    (Tag::EarlyQueen, early_queen),
    (Tag::KnightOnRim, knight_on_rim),
    (Tag::EdgePawnPush, edge_pawn_push),
    (Tag::RedundantMove, redundant_move),
    (Tag::BadTrade, bad_trade),
    (Tag::AllowedTrade, allowed_trade),
    (Tag::KicksPiece, kicks_piece),
];

pub fn derive_tags(facts: &MoveFacts) -> impl Iterator<Item = Tag> + '_ {
    TAG_RULES
        .iter()
        .filter(move |(_, rule)| rule(facts))
        .map(|(tag, _)| *tag)
}

fn missed_mate(f: &MoveFacts) -> bool {
    f.mate_for_mover_before && !f.mate_after
}

fn hanging_piece(f: &MoveFacts) -> bool {
    f.is_mistake() && f.material_delta <= -3
}

fn lost_material(f: &MoveFacts) -> bool {
    f.is_mistake() && f.material_delta < 0 && f.material_delta > -3
}

fn missed_tactic(f: &MoveFacts) -> bool {
    f.is_mistake()
        && f
            .pre_pv_san
            .iter()
            .any(|san| san.contains(['x', '+', '#']))
}

fn weakened_king(f: &MoveFacts) -> bool {
    f.is_mistake() && f.san.starts_with('K')
}

fn ignored_threat(f: &MoveFacts) -> bool {
    f.is_mistake() && f.reply.as_ref().is_some_and(|r| r.is_capture)
}

/// Raw White-perspective swing, not mover-relative.
fn missed_fork(f: &MoveFacts) -> bool {
    f.engine_best_piece == Some(PieceKind::Knight) && f.score_before - f.score_after > 2.0
}

fn missed_castling(f: &MoveFacts) -> bool {
    f.in_opening() && f.piece == PieceKind::King && !f.is_castling()
}

fn early_queen(f: &MoveFacts) -> bool {
    f.in_opening() && f.piece == PieceKind::Queen && f.ply < 10
}

fn knight_on_rim(f: &MoveFacts) -> bool {
    f.piece == PieceKind::Knight && matches!(f.to_file(), Some('a' | 'h'))
}

fn edge_pawn_push(f: &MoveFacts) -> bool {
    f.in_opening()
        && f.piece == PieceKind::Pawn
        && !f.is_capture()
        && matches!(f.to_file(), Some('a' | 'h'))
        && matches!(f.to_rank(), Some(3..=6))
}

fn redundant_move(f: &MoveFacts) -> bool {
    f.in_opening()
        && f
            .two_plies_back
            .as_ref()
            .is_some_and(|earlier| earlier.piece == f.piece && earlier.to == f.from)
}

fn is_even_capture(f: &MoveFacts) -> bool {
    f.material_delta == 0 && f.is_capture()
}

fn bad_trade(f: &MoveFacts) -> bool {
    is_even_capture(f) && f.mover_score_before() < -3.0
}

fn allowed_trade(f: &MoveFacts) -> bool {
    is_even_capture(f) && f.mover_score_before() >= -3.0
}

fn kicks_piece(f: &MoveFacts) -> bool {
    if f.piece != PieceKind::Pawn || f.is_mistake() {
        return false;
    }
    match f.reply.as_ref().and_then(|r| r.source_piece) {
        Some((owner, kind)) => owner == f.mover.opponent() && kind.is_minor_or_major(),
        None => false,
    }
}
